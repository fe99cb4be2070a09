//! Replica configuration.

use crate::error::{Error, Result};

/// Largest exponent used when computing the digit width at a depth. Keeps
/// every digit inside `i32`.
pub const MAX_WIDTH_BITS: u32 = 31;

/// Tuning for the [`PositionGenerator`](crate::PositionGenerator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct GeneratorConfig {
    /// Bits of digit space at depth 0. Each deeper level adds one bit.
    pub starting_width: u32,
    /// Upper bound on how far from a boundary a new digit is placed.
    pub max_distance: u32,
}

impl GeneratorConfig {
    /// Check the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.starting_width == 0 || self.starting_width > MAX_WIDTH_BITS {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "starting_width must be in 1..={MAX_WIDTH_BITS}, got {}",
                    self.starting_width
                ),
            });
        }
        if self.max_distance == 0 {
            return Err(Error::InvalidConfig {
                reason: "max_distance must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            starting_width: 4,
            max_distance: 10,
        }
    }
}

/// Everything needed to construct a replica.
///
/// ```
/// use kseq::Config;
///
/// let config = Config::new("alice").with_seed(7);
/// assert!(config.validate().is_ok());
/// assert!(Config::new("").validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Config {
    /// Unique name of this replica. Also seeds the high bits of record ids.
    pub replica_id: String,
    /// Identifier allocation tuning.
    #[cfg_attr(feature = "serde", serde(default))]
    pub generator: GeneratorConfig,
    /// Seed for the allocation RNG. `None` draws from OS entropy.
    #[cfg_attr(feature = "serde", serde(default))]
    pub seed: Option<u64>,
}

impl Config {
    /// Default configuration for the named replica.
    pub fn new(replica_id: impl Into<String>) -> Self {
        Self {
            replica_id: replica_id.into(),
            generator: GeneratorConfig::default(),
            seed: None,
        }
    }

    /// Use a fixed RNG seed so identifier allocation is reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Override the generator tuning.
    #[must_use]
    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.replica_id.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "replica_id must not be empty".into(),
            });
        }
        self.generator.validate()
    }
}
