use burn::data::dataset::Dataset;
use std::sync::Arc;

use crate::domain::sequence::{SequenceData, SequenceSample};

/// A view of the shared dataset restricted to an ordered index list
/// (one side of the train/validation split).
#[derive(Debug, Clone)]
pub struct SequenceDataset {
    data:    Arc<SequenceData>,
    indices: Vec<usize>,
}

impl SequenceDataset {
    pub fn new(data: Arc<SequenceData>, indices: Vec<usize>) -> Self {
        Self { data, indices }
    }

    /// Every sample, in dataset order.
    pub fn full(data: Arc<SequenceData>) -> Self {
        let indices = (0..data.len()).collect();
        Self { data, indices }
    }
}

impl Dataset<SequenceSample> for SequenceDataset {
    fn get(&self, index: usize) -> Option<SequenceSample> {
        self.indices
            .get(index)
            .and_then(|&i| self.data.get(i))
            .cloned()
    }

    fn len(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Arc<SequenceData> {
        let samples = (0..4)
            .map(|i| SequenceSample { features: vec![i as f32], labels: vec![i], valid_len: 1 })
            .collect();
        Arc::new(SequenceData::new(samples, 1, 1))
    }

    #[test]
    fn test_subset_follows_index_order() {
        let subset = SequenceDataset::new(data(), vec![3, 1]);
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.get(0).unwrap().labels, vec![3]);
        assert_eq!(subset.get(1).unwrap().labels, vec![1]);
        assert!(subset.get(2).is_none());
    }

    #[test]
    fn test_full_view() {
        let all = SequenceDataset::full(data());
        let labels: Vec<i64> = (0..all.len()).map(|i| all.get(i).unwrap().labels[0]).collect();
        assert_eq!(labels, vec![0, 1, 2, 3]);
    }
}
