//! Strategies for finding the next valid suffix of a score chain.

use std::sync::Arc;

use rand::Rng;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder, prelude::*};

use crate::difficulty::Stepper;

/// Candidates handed to the pool per round in [`ParallelSearch`].
const PARALLEL_BATCH: u64 = 1 << 20;

/// Finds a suffix `s` such that `step(prev, s)` meets `strength`.
///
/// Implementations must only return tokens made of characters that survive
/// the score text encoding: no whitespace, `/` or `:`.
pub trait SuffixSearch {
    fn find(&self, prev: &str, strength: u8) -> String;
}

/// Walks a hex counter upwards from `start`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialSearch {
    pub start: u64,
}

impl SuffixSearch for SequentialSearch {
    fn find(&self, prev: &str, strength: u8) -> String {
        let stepper = Stepper::new(prev);
        let mut n = self.start;
        loop {
            let suffix = format!("{n:x}");
            if stepper.accepts(&suffix, strength) {
                return suffix;
            }
            n = n.wrapping_add(1);
        }
    }
}

/// Tries random 64-bit tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSearch;

impl SuffixSearch for RandomSearch {
    fn find(&self, prev: &str, strength: u8) -> String {
        let stepper = Stepper::new(prev);
        let mut rng = rand::rng();
        loop {
            let suffix = format!("{:x}", rng.random::<u64>());
            if stepper.accepts(&suffix, strength) {
                return suffix;
            }
        }
    }
}

/// Splits the counter space across a dedicated rayon pool.
#[derive(Debug, Clone)]
pub struct ParallelSearch {
    pool: Arc<ThreadPool>,
}

impl ParallelSearch {
    /// Build a pool with `threads` workers, `0` meaning one per CPU.
    pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tally-farm-{i}"))
            .build()?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl SuffixSearch for ParallelSearch {
    fn find(&self, prev: &str, strength: u8) -> String {
        let stepper = Stepper::new(prev);
        let mut base = 0u64;
        loop {
            let found = self.pool.install(|| {
                (base..base.saturating_add(PARALLEL_BATCH))
                    .into_par_iter()
                    .find_map_any(|n| {
                        let suffix = format!("{n:x}");
                        stepper.accepts(&suffix, strength).then_some(suffix)
                    })
            });
            if let Some(suffix) = found {
                return suffix;
            }
            base = base.wrapping_add(PARALLEL_BATCH);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::{meets, step};

    const PREV: &str = "2026-10-19T10:00:00Z localhost 4096 NOPREFIX@ffffffffffffffff";

    fn check(search: &impl SuffixSearch, strength: u8) {
        let suffix = search.find(PREV, strength);
        assert!(!suffix.is_empty());
        assert!(!suffix.contains(|c: char| c.is_whitespace() || c == '/' || c == ':'));
        assert!(meets(&step(PREV, &suffix), strength));
    }

    #[test]
    fn sequential_finds_valid_suffix() {
        check(&SequentialSearch::default(), 3);
    }

    #[test]
    fn sequential_is_deterministic() {
        let search = SequentialSearch::default();
        assert_eq!(search.find(PREV, 2), search.find(PREV, 2));
    }

    #[test]
    fn sequential_respects_start() {
        let first = SequentialSearch::default().find(PREV, 2);
        let n = u64::from_str_radix(&first, 16).unwrap();
        let later = SequentialSearch { start: n + 1 }.find(PREV, 2);
        assert!(u64::from_str_radix(&later, 16).unwrap() > n);
    }

    #[test]
    fn random_finds_valid_suffix() {
        check(&RandomSearch, 2);
    }

    #[test]
    fn parallel_finds_valid_suffix() {
        let search = ParallelSearch::new(2).unwrap();
        assert_eq!(search.threads(), 2);
        check(&search, 3);
    }
}
