//! Path-based position identifiers.
//!
//! An [`Ident`] places an element in the sequence. Identifiers are totally
//! ordered, so a new one can always be manufactured between any two existing
//! ones by growing the path (see [`PositionGenerator`](crate::PositionGenerator)).

use core::cmp::Ordering;
use core::fmt;

/// One level of an identifier path: a digit allocated by a replica.
///
/// Segments order by digit first, then by replica name as a tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    digit: i32,
    replica: String,
}

impl Segment {
    /// Create a segment.
    pub fn new(digit: i32, replica: impl Into<String>) -> Self {
        Self {
            digit,
            replica: replica.into(),
        }
    }

    /// The digit at this level.
    #[must_use]
    pub fn digit(&self) -> i32 {
        self.digit
    }

    /// The replica that allocated this level.
    #[must_use]
    pub fn replica(&self) -> &str {
        &self.replica
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.digit
            .cmp(&other.digit)
            .then_with(|| self.replica.as_bytes().cmp(other.replica.as_bytes()))
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An immutable position token: a logical time plus a path of segments.
///
/// # Ordering
///
/// Paths are compared segment by segment. When one path runs out while the
/// other continues, the shorter one sorts first. Only structurally identical
/// paths fall through to comparing `time`.
///
/// ```
/// use kseq::{Ident, Segment};
///
/// let short = Ident::new(9, vec![Segment::new(3, "a")]);
/// let long = Ident::new(1, vec![Segment::new(3, "a"), Segment::new(1, "a")]);
/// assert!(short < long);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ident {
    time: i64,
    path: Vec<Segment>,
}

impl Ident {
    /// Create an identifier from a logical time and a path.
    pub fn new(time: i64, path: Vec<Segment>) -> Self {
        Self { time, path }
    }

    /// The identifier with an empty path, ordered before every other identifier.
    #[must_use]
    pub fn lowest() -> Self {
        Self {
            time: 0,
            path: Vec::new(),
        }
    }

    /// Logical time at which the identifier was allocated.
    #[must_use]
    pub fn time(&self) -> i64 {
        self.time
    }

    /// The full path.
    #[must_use]
    pub fn path(&self) -> &[Segment] {
        &self.path
    }

    /// Number of segments in the path.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// The segment at `depth`, if the path is that deep.
    #[must_use]
    pub fn get(&self, depth: usize) -> Option<&Segment> {
        self.path.get(depth)
    }
}

impl Ord for Ident {
    fn cmp(&self, other: &Self) -> Ordering {
        for (mine, theirs) in self.path.iter().zip(&other.path) {
            match mine.cmp(theirs) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }

        self.path
            .len()
            .cmp(&other.path.len())
            .then(self.time.cmp(&other.time))
    }
}

impl PartialOrd for Ident {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}:{}", segment.digit, segment.replica)?;
        }
        write!(f, "]@{}", self.time)
    }
}
