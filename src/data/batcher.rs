// ============================================================
// Layer 4: Sequence Batcher
// ============================================================
// Implements Burn's Batcher trait to stack fitted samples into
// tensors on the target device.
//
//   Input:  Vec of N SequenceSamples (all seq_len S, F features)
//   Output: SequenceBatch
//             inputs  [N, S, F]  float
//             targets [N, S]     int class ids
//             mask    [N, S]     float, 1.0 on real steps
//
// Samples are already fitted to a common length by the loader,
// so batching is a flatten + reshape.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::domain::sequence::SequenceSample;

#[derive(Debug, Clone)]
pub struct SequenceBatch<B: Backend> {
    pub inputs:  Tensor<B, 3>,
    pub targets: Tensor<B, 2, Int>,
    pub mask:    Tensor<B, 2>,
}

#[derive(Clone, Debug)]
pub struct SequenceBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SequenceBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<SequenceSample, SequenceBatch<B>> for SequenceBatcher<B> {
    fn batch(&self, items: Vec<SequenceSample>) -> SequenceBatch<B> {
        let batch_size  = items.len();
        let seq_len     = items.first().map(|s| s.seq_len()).unwrap_or(0);
        let feature_dim = if seq_len > 0 {
            items[0].features.len() / seq_len
        } else {
            0
        };

        let features: Vec<f32> = items.iter().flat_map(|s| s.features.iter().copied()).collect();
        let labels:   Vec<i64> = items.iter().flat_map(|s| s.labels.iter().copied()).collect();
        let mask:     Vec<f32> = items.iter().flat_map(|s| s.step_mask()).collect();

        let inputs = Tensor::<B, 3>::from_data(
            TensorData::new(features, [batch_size, seq_len, feature_dim]),
            &self.device,
        );
        let targets = Tensor::<B, 2, Int>::from_data(
            TensorData::new(labels, [batch_size, seq_len]),
            &self.device,
        );
        let mask = Tensor::<B, 2>::from_data(
            TensorData::new(mask, [batch_size, seq_len]),
            &self.device,
        );

        SequenceBatch { inputs, targets, mask }
    }
}
