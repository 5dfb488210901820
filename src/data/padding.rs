// ============================================================
// Layer 4: Sequence Fitting
// ============================================================
// Brings every raw sequence to the run's fixed length so samples
// can be stacked into [batch, seq_len, feature_dim] tensors.
//
//   longer than max_seq_len  → keep the first max_seq_len steps
//   shorter than max_seq_len → zero features, label 0 afterwards
//
// valid_len remembers how many steps are real; the batcher turns
// it into a mask so padded steps never count toward the loss or
// the accuracy.

use crate::domain::sequence::SequenceSample;

/// Label written into padded steps. Masked out downstream.
pub const PAD_LABEL: i64 = 0;

pub struct SequenceFitter {
    max_seq_len: usize,
}

impl SequenceFitter {
    pub fn new(max_seq_len: usize) -> Self {
        Self { max_seq_len }
    }

    /// `features` is `[steps, feature_dim]` row-major, `labels` is `[steps]`.
    pub fn fit(&self, features: &[f32], labels: &[i64], feature_dim: usize) -> SequenceSample {
        let steps     = labels.len();
        let valid_len = steps.min(self.max_seq_len);

        let mut fitted_features = Vec::with_capacity(self.max_seq_len * feature_dim);
        fitted_features.extend_from_slice(&features[..valid_len * feature_dim]);
        fitted_features.resize(self.max_seq_len * feature_dim, 0.0);

        let mut fitted_labels = Vec::with_capacity(self.max_seq_len);
        fitted_labels.extend_from_slice(&labels[..valid_len]);
        fitted_labels.resize(self.max_seq_len, PAD_LABEL);

        SequenceSample {
            features:  fitted_features,
            labels:    fitted_labels,
            valid_len,
        }
    }
}
