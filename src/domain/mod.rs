// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust structs and traits describing what a training run
// is made of. No Burn types, no file I/O.
//
//   params.rs     TrainParams / ModelParams / RunConfig
//   sequence.rs   SequenceSample and the assembled SequenceData
//   traits.rs     SampleSource, implemented by the data layer

pub mod params;

pub mod sequence;

pub mod traits;
