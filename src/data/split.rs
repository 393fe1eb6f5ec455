use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, SeedableRng};

use super::model::SplitIndices;
use crate::error::{DatasetError, Result};

/// Training records at scale 1.0.
pub const TRAIN_BASE: usize = 5278;
/// Validation records at scale 1.0.
pub const VALIDATION_BASE: usize = 256;

/// `(train_count, val_count)` for a scale factor, both floored.
pub fn split_sizes(scale: f64) -> Result<(usize, usize)> {
    if !scale.is_finite() || scale < 0.0 {
        return Err(DatasetError::InvalidScale(scale));
    }
    let train = (TRAIN_BASE as f64 * scale).floor() as usize;
    let validation = (VALIDATION_BASE as f64 * scale).floor() as usize;
    Ok((train, validation))
}

/// Shuffle `0..count` and cut the permutation into train and validation.
///
/// Fails instead of truncating when the two partitions do not fit in `count`.
/// With `seed` the permutation is reproducible; without it the thread RNG is used.
pub fn split(count: usize, scale: f64, seed: Option<u64>) -> Result<SplitIndices> {
    let (train, validation) = split_sizes(scale)?;
    let too_large = DatasetError::SplitTooLarge {
        train,
        validation,
        available: count,
    };
    match train.checked_add(validation) {
        Some(needed) if needed <= count => {}
        _ => return Err(too_large),
    }

    let mut order: Vec<usize> = (0..count).collect();
    match seed {
        Some(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => order.shuffle(&mut thread_rng()),
    }

    let validation_part = order[train..train + validation].to_vec();
    order.truncate(train);
    Ok(SplitIndices {
        train: order,
        validation: validation_part,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn sizes_scale_with_factor() {
        assert_eq!(split_sizes(1.0).unwrap(), (5278, 256));
        assert_eq!(split_sizes(0.5).unwrap(), (2639, 128));
        assert_eq!(split_sizes(0.0).unwrap(), (0, 0));
        // 5278 * 0.3 = 1583.4, 256 * 0.3 = 76.8
        assert_eq!(split_sizes(0.3).unwrap(), (1583, 76));
    }

    #[test]
    fn rejects_bad_scale() {
        assert!(matches!(split_sizes(-0.1), Err(DatasetError::InvalidScale(_))));
        assert!(matches!(split_sizes(f64::NAN), Err(DatasetError::InvalidScale(_))));
    }

    #[test]
    fn partitions_are_disjoint_and_sized() {
        let s = split(6000, 1.0, None).unwrap();
        assert_eq!(s.train.len(), 5278);
        assert_eq!(s.validation.len(), 256);
        let train: BTreeSet<_> = s.train.iter().copied().collect();
        assert_eq!(train.len(), 5278);
        assert!(s.validation.iter().all(|i| !train.contains(i) && *i < 6000));
    }

    #[test]
    fn exact_fit_is_allowed() {
        let s = split(5534, 1.0, Some(1)).unwrap();
        let mut all: Vec<_> = s.train.iter().chain(&s.validation).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..5534).collect::<Vec<_>>());
    }

    #[test]
    fn oversized_split_is_an_error() {
        let err = split(5000, 1.0, Some(3)).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::SplitTooLarge {
                train: 5278,
                validation: 256,
                available: 5000
            }
        ));
    }

    #[test]
    fn huge_scale_does_not_overflow() {
        let err = split(10, 1e300, Some(1)).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::SplitTooLarge {
                train: usize::MAX,
                validation: usize::MAX,
                available: 10
            }
        ));
    }

    #[test]
    fn seed_makes_split_reproducible() {
        let a = split(3000, 0.5, Some(42)).unwrap();
        let b = split(3000, 0.5, Some(42)).unwrap();
        let c = split(3000, 0.5, Some(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
