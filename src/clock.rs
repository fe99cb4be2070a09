//! Wall-clock source stamped onto outgoing operations.
//!
//! Wall time is informational: it travels with every [`Operation`](crate::Operation)
//! but never takes part in ordering, which is decided entirely by identifiers.
//!
//! ```
//! use kseq::clock::WallClock;
//!
//! let clock = WallClock::with_time_source(|| 42);
//! assert_eq!(clock.now(), 42);
//! ```

/// A source of wall-clock timestamps in microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    /// Function returning the current time in microseconds.
    time_fn: fn() -> i64,
}

fn system_time_us() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as i64
}

impl WallClock {
    /// Clock backed by `SystemTime`.
    pub fn system() -> Self {
        Self {
            time_fn: system_time_us,
        }
    }

    /// Clock backed by a custom time source, for deterministic tests or
    /// hosts that keep their own notion of time.
    pub fn with_time_source(time_fn: fn() -> i64) -> Self {
        Self { time_fn }
    }

    /// Read the current time.
    pub fn now(&self) -> i64 {
        (self.time_fn)()
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::system()
    }
}
