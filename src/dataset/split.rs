//! Train/val/test assignment
//!
//! The whole file list is shuffled once with a caller-owned, seeded RNG and
//! then cut into three contiguous segments. Boundaries are truncated, not
//! rounded: `floor(n * train)` files go to train, the next
//! `floor(n * val)` to val, and everything left to test. Rounding losses
//! therefore always land in the test split.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SplitRatios;

/// The three dataset partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitName {
    Train,
    Val,
    Test,
}

impl SplitName {
    /// All splits in layout order
    pub const ALL: [SplitName; 3] = [SplitName::Train, SplitName::Val, SplitName::Test];

    /// Directory name of the split
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitName::Train => "train",
            SplitName::Val => "val",
            SplitName::Test => "test",
        }
    }
}

impl fmt::Display for SplitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Items partitioned into the three splits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAssignment<T> {
    pub train: Vec<T>,
    pub val: Vec<T>,
    pub test: Vec<T>,
}

impl<T> SplitAssignment<T> {
    /// Items assigned to `split`
    pub fn get(&self, split: SplitName) -> &[T] {
        match split {
            SplitName::Train => &self.train,
            SplitName::Val => &self.val,
            SplitName::Test => &self.test,
        }
    }

    /// Number of assigned items
    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }
}

/// Sizes of (train, val, test) for `total` items
pub fn split_sizes(total: usize, ratios: &SplitRatios) -> (usize, usize, usize) {
    let train = ((total as f64 * ratios.train).floor() as usize).min(total);
    let val = ((total as f64 * ratios.val).floor() as usize).min(total - train);
    (train, val, total - train - val)
}

/// Shuffle `items` with `rng` and cut them by `ratios`
pub fn assign<T, R: Rng + ?Sized>(
    mut items: Vec<T>,
    ratios: &SplitRatios,
    rng: &mut R,
) -> SplitAssignment<T> {
    items.shuffle(rng);

    let (n_train, n_val, _) = split_sizes(items.len(), ratios);
    let test = items.split_off(n_train + n_val);
    let val = items.split_off(n_train);

    SplitAssignment {
        train: items,
        val,
        test,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ratios(train: f64, val: f64, test: f64) -> SplitRatios {
        SplitRatios::new(train, val, test).unwrap()
    }

    #[test]
    fn test_ten_items_default_ratios() {
        assert_eq!(split_sizes(10, &ratios(0.7, 0.15, 0.15)), (7, 1, 2));
    }

    #[test]
    fn test_rounding_accrues_to_test() {
        assert_eq!(split_sizes(3, &ratios(0.7, 0.15, 0.15)), (2, 0, 1));
        assert_eq!(split_sizes(1, &ratios(0.7, 0.15, 0.15)), (0, 0, 1));
        assert_eq!(split_sizes(0, &ratios(0.7, 0.15, 0.15)), (0, 0, 0));
    }

    #[test]
    fn test_sizes_cover_population() {
        let sets = [
            ratios(0.7, 0.15, 0.15),
            ratios(0.8, 0.1, 0.1),
            ratios(0.34, 0.33, 0.33),
            ratios(1.0, 0.0, 0.0),
            ratios(0.0, 0.0, 1.0),
            ratios(0.5, 0.505, 0.0),
        ];
        for r in &sets {
            for n in 0..300 {
                let (a, b, c) = split_sizes(n, r);
                assert_eq!(a + b + c, n, "n={} ratios={:?}", n, r);
            }
        }
    }

    #[test]
    fn test_assignment_is_a_partition() {
        let items: Vec<usize> = (0..57).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let split = assign(items, &ratios(0.7, 0.15, 0.15), &mut rng);

        assert_eq!(split.train.len(), 39);
        assert_eq!(split.val.len(), 8);
        assert_eq!(split.test.len(), 10);

        let mut all: Vec<usize> = split
            .train
            .iter()
            .chain(&split.val)
            .chain(&split.test)
            .copied()
            .collect();
        all.sort();
        assert_eq!(all, (0..57).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_assignment() {
        let items: Vec<usize> = (0..40).collect();
        let r = ratios(0.7, 0.15, 0.15);

        let a = assign(items.clone(), &r, &mut ChaCha8Rng::seed_from_u64(7));
        let b = assign(items, &r, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_different_assignment() {
        let items: Vec<usize> = (0..40).collect();
        let r = ratios(0.7, 0.15, 0.15);

        let a = assign(items.clone(), &r, &mut ChaCha8Rng::seed_from_u64(1));
        let b = assign(items, &r, &mut ChaCha8Rng::seed_from_u64(2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_split_name_strings() {
        let names: Vec<_> = SplitName::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["train", "val", "test"]);
    }
}
