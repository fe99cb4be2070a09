//! LSEQ-style identifier allocation.
//!
//! The generator walks down the identifier tree until it finds a depth with
//! room between the two neighbours, then places a new digit near one end of
//! that gap. Which end is decided once per depth by a coin flip and remembered
//! for the life of the generator, so that repeated appends and repeated
//! prepends do not both exhaust the same depth.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{GeneratorConfig, MAX_WIDTH_BITS};
use crate::ident::{Ident, Segment};

/// Which end of a gap new digits are allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Place the digit just above the lower bound.
    AddFromLeft,
    /// Place the digit just below the upper bound.
    SubtractFromRight,
}

/// Allocates identifiers strictly between two neighbours.
///
/// # Example
///
/// ```
/// use kseq::{GeneratorConfig, PositionGenerator};
///
/// let mut generator = PositionGenerator::with_seed(GeneratorConfig::default(), 1);
/// let a = generator.generate("alice", 1, None, None);
/// let b = generator.generate("alice", 2, Some(&a), None);
/// let c = generator.generate("alice", 3, Some(&a), Some(&b));
/// assert!(a < c && c < b);
/// ```
#[derive(Debug, Clone)]
pub struct PositionGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    /// Memoized strategy per depth, grown on first visit.
    strategies: Vec<Strategy>,
    /// Upper sentinels, one per replica name.
    upper: BTreeMap<String, Ident>,
}

impl PositionGenerator {
    /// Create a generator seeded from OS entropy.
    ///
    /// The config is not validated here; a `max_distance` of zero behaves
    /// like one.
    pub fn new(config: GeneratorConfig) -> Self {
        Self::from_rng(config, StdRng::from_entropy())
    }

    /// Create a generator with a fixed seed.
    pub fn with_seed(config: GeneratorConfig, seed: u64) -> Self {
        Self::from_rng(config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(config: GeneratorConfig, rng: StdRng) -> Self {
        let capacity = config
            .starting_width
            .saturating_add(config.max_distance)
            .saturating_add(1)
            .min(MAX_WIDTH_BITS) as usize;
        Self {
            config,
            rng,
            strategies: Vec::with_capacity(capacity),
            upper: BTreeMap::new(),
        }
    }

    /// The tuning this generator was built with.
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Strategies chosen so far, indexed by depth.
    #[must_use]
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Largest digit at `depth`: `2^(depth + starting_width) - 1`, with the
    /// exponent capped at [`MAX_WIDTH_BITS`].
    #[must_use]
    pub fn width_at(&self, depth: usize) -> i32 {
        let bits = u32::try_from(depth)
            .unwrap_or(u32::MAX)
            .saturating_add(self.config.starting_width)
            .min(MAX_WIDTH_BITS);
        ((1i64 << bits) - 1) as i32
    }

    /// Allocate an identifier strictly between `before` and `after`.
    ///
    /// `None` for `before` means "before everything"; `None` for `after` means
    /// "after everything" and is backed by a sentinel cached per replica name.
    pub fn generate(
        &mut self,
        replica: &str,
        time: i64,
        before: Option<&Ident>,
        after: Option<&Ident>,
    ) -> Ident {
        let lowest = Ident::lowest();
        let before = before.unwrap_or(&lowest);
        let upper;
        let after = match after {
            Some(after) => after,
            None => {
                upper = self.upper_sentinel(replica);
                &upper
            }
        };

        let mut depth = 0;
        let (min, max) = loop {
            let min = before.get(depth).map_or(0, Segment::digit) as i64;
            let max = match after.get(depth) {
                Some(segment) => segment.digit() as i64,
                None => self.width_at(depth) as i64,
            };
            if max - min - 1 > 0 {
                break (min, max);
            }
            depth += 1;
        };

        let step = i64::from(self.config.max_distance.max(1));
        let boundary = (max - min - 1).min(step);
        let delta = self.rng.gen_range(1..=boundary);
        let digit = match self.strategy_at(depth) {
            Strategy::AddFromLeft => min + delta,
            Strategy::SubtractFromRight => max - delta,
        };

        let mut path = Vec::with_capacity(depth + 1);
        for level in 0..depth {
            let segment = match (before.get(level), after.get(level)) {
                (Some(segment), _) => segment.clone(),
                // Borrowing a zero segment from `after` keeps the result below it.
                (None, Some(segment)) if segment.digit() == 0 => segment.clone(),
                _ => Segment::new(0, replica),
            };
            path.push(segment);
        }
        path.push(Segment::new(digit as i32, replica));

        Ident::new(time, path)
    }

    fn strategy_at(&mut self, depth: usize) -> Strategy {
        while self.strategies.len() <= depth {
            let strategy = if self.rng.gen_bool(0.5) {
                Strategy::AddFromLeft
            } else {
                Strategy::SubtractFromRight
            };
            self.strategies.push(strategy);
        }
        self.strategies[depth]
    }

    fn upper_sentinel(&mut self, replica: &str) -> Ident {
        if let Some(sentinel) = self.upper.get(replica) {
            return sentinel.clone();
        }
        let sentinel = Ident::new(0, alloc::vec![Segment::new(self.width_at(0), replica)]);
        self.upper.insert(replica.into(), sentinel.clone());
        sentinel
    }
}
