// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything between the sample files on disk and the tensor
// batches consumed by the fit loop:
//
//   .safetensors files
//       │
//       ▼
//   SafetensorsLoader → reads x / y tensors per file
//       │
//       ▼
//   SequenceFitter    → truncates / pads to max_seq_len
//       │
//       ▼
//   split_train_val   → seeded, disjoint index subsets
//       │
//       ▼
//   SequenceDataset   → Burn Dataset over one subset
//       │
//       ▼
//   SequenceBatcher   → stacks samples into tensors
//       │
//       ▼
//   BatchProvider     → ordered epochs, persistent workers
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads sample files into the in-memory dataset
pub mod loader;

/// Fits raw sequences to the configured length
pub mod padding;

/// Burn Dataset view over a split subset
pub mod dataset;

/// Burn Batcher producing input/target/mask tensors
pub mod batcher;

/// Seeded train/validation index split
pub mod splitter;

/// Epoch iteration with background workers
pub mod provider;

#[cfg(test)]
pub mod fixtures;
