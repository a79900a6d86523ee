//! Seeded stratified train/test partitioning.

use crate::{CoreError, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::BTreeMap;

/// Row indices of the two partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition row indices so both sides keep the label ratio of `labels`.
///
/// `n_test = ceil(test_size * n)`. Test slots are handed to each class in
/// proportion to its frequency; leftover slots go to the classes with the
/// largest fractional share. The same `seed` always yields the same split.
pub fn stratified_split(labels: &[u32], test_size: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(CoreError::InvalidSplit(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n_samples = labels.len();
    let n_test = (test_size * n_samples as f64).ceil() as usize;
    let n_train = n_samples.saturating_sub(n_test);

    let mut by_class: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.iter().enumerate() {
        by_class.entry(*label).or_default().push(idx);
    }

    if let Some((label, rows)) = by_class.iter().find(|(_, rows)| rows.len() < 2) {
        return Err(CoreError::InvalidSplit(format!(
            "class {} has only {} member(s); at least 2 are required",
            label,
            rows.len()
        )));
    }

    let n_classes = by_class.len();
    if n_test < n_classes || n_train < n_classes {
        return Err(CoreError::InvalidSplit(format!(
            "train size {} and test size {} must both be at least the number of classes ({})",
            n_train, n_test, n_classes
        )));
    }

    let allocation = allocate_test_rows(&by_class, n_samples, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);

    for (rows, take) in by_class.values_mut().zip(allocation) {
        rows.shuffle(&mut rng);
        let (test_rows, train_rows) = rows.split_at(take);
        test.extend_from_slice(test_rows);
        train.extend_from_slice(train_rows);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(SplitIndices { train, test })
}

/// Number of test rows per class, in class order.
fn allocate_test_rows(
    by_class: &BTreeMap<u32, Vec<usize>>,
    n_samples: usize,
    n_test: usize,
) -> Vec<usize> {
    let shares: Vec<f64> = by_class
        .values()
        .map(|rows| rows.len() as f64 * n_test as f64 / n_samples as f64)
        .collect();

    let mut allocation: Vec<usize> = shares.iter().map(|share| share.floor() as usize).collect();
    let assigned: usize = allocation.iter().sum();

    let mut order: Vec<usize> = (0..shares.len()).collect();
    // Stable sort keeps class order among equal remainders.
    order.sort_by(|a, b| {
        let ra = shares[*a] - shares[*a].floor();
        let rb = shares[*b] - shares[*b].floor();
        rb.total_cmp(&ra)
    });

    for class_idx in order.into_iter().take(n_test.saturating_sub(assigned)) {
        allocation[class_idx] += 1;
    }

    allocation
}
