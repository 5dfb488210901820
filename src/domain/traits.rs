// ============================================================
// Layer 3: Core Traits
// ============================================================
// The application layer asks a SampleSource for the assembled
// dataset and never sees the on-disk format behind it.
//
// Implementations:
//   - SafetensorsLoader → a directory of .safetensors files

use anyhow::Result;

use crate::domain::sequence::SequenceData;

/// Anything that can assemble the full in-memory dataset.
pub trait SampleSource {
    fn load_all(&self) -> Result<SequenceData>;
}
