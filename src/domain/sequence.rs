// ============================================================
// Layer 3: Sequence Domain Types
// ============================================================
// A SequenceSample is one labelled time series, already fitted
// to the run's sequence length:
//
//   features: [seq_len * feature_dim]  row-major, step by step
//   labels:   [seq_len]                one class id per step
//   valid_len                          real steps before padding
//
// SequenceData is the assembled dataset held in memory for the
// whole run. Storing inputs and targets together per sample makes
// "same number of inputs and targets" hold by construction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSample {
    pub features:  Vec<f32>,
    pub labels:    Vec<i64>,
    pub valid_len: usize,
}

impl SequenceSample {
    pub fn seq_len(&self) -> usize {
        self.labels.len()
    }

    /// 1.0 for real steps, 0.0 for padding.
    pub fn step_mask(&self) -> Vec<f32> {
        (0..self.seq_len())
            .map(|t| if t < self.valid_len { 1.0 } else { 0.0 })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SequenceData {
    samples:     Vec<SequenceSample>,
    seq_len:     usize,
    feature_dim: usize,
}

impl SequenceData {
    pub fn new(samples: Vec<SequenceSample>, seq_len: usize, feature_dim: usize) -> Self {
        debug_assert!(samples
            .iter()
            .all(|s| s.labels.len() == seq_len && s.features.len() == seq_len * feature_dim));
        Self { samples, seq_len, feature_dim }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn get(&self, index: usize) -> Option<&SequenceSample> {
        self.samples.get(index)
    }

    /// Largest class id present, padding included.
    pub fn max_label(&self) -> Option<i64> {
        self.samples.iter().flat_map(|s| s.labels.iter().copied()).max()
    }

    /// `[samples, seq_len, feature_dim]`
    pub fn shape_x(&self) -> [usize; 3] {
        [self.samples.len(), self.seq_len, self.feature_dim]
    }

    /// `[samples, seq_len]`
    pub fn shape_y(&self) -> [usize; 2] {
        [self.samples.len(), self.seq_len]
    }
}
