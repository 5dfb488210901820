// ============================================================
// Layer 4: Train/Validation Splitter
// ============================================================
// Partitions sample indices 0..N into two disjoint subsets:
//
//   train: floor(ratio * N) indices
//   valid: the remaining N - train indices
//
// The indices are permuted with a seeded StdRng before cutting,
// so both the sizes and the membership of each subset are fixed
// by (N, ratio, seed). Each subset keeps the permuted order; the
// validation provider later walks it exactly in that order.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

/// Number of training samples for `total` samples at `ratio`.
pub fn train_size(total: usize, ratio: f64) -> usize {
    ((total as f64) * ratio).floor() as usize
}

/// Seeded random split of `0..total` into (train, validation) index lists.
pub fn split_train_val(total: usize, ratio: f64, seed: u64) -> Result<SplitPlan> {
    ensure!(
        (0.0..=1.0).contains(&ratio),
        "train ratio must be within [0, 1], got {ratio}"
    );

    let mut indices: Vec<usize> = (0..total).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    // Clamp guards against float rounding at ratio == 1.0
    let split_at = train_size(total, ratio).min(total);
    let valid = indices.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation (ratio {})",
        indices.len(),
        valid.len(),
        ratio
    );

    Ok(SplitPlan { train: indices, valid })
}
