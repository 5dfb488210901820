// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// Burn-specific code for the CfC network and its training:
//
//   model.rs          CfC cell + per-step projection head
//   learner.rs        TrainableUnit trait, AdamW setup, lr decay,
//                     masked loss and accuracy
//   early_stopping.rs patience on the monitored metric
//   trainer.rs        the fit loop and its policies
//   evaluator.rs      scores a saved run on a dataset
//
// Training runs on Autodiff<Wgpu>; validation and evaluation use
// the inner Wgpu backend (model.valid()).
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Hasani et al. (2022) Closed-form continuous-time
//            neural networks

/// Backend used for gradient computation
pub type TrainingBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Backend used for validation and evaluation
pub type InferenceBackend = burn::backend::Wgpu;

/// CfC network architecture
pub mod model;

/// Model adapter consumed by the fit loop
pub mod learner;

/// Patience-based halting on a monitored metric
pub mod early_stopping;

/// Epoch loop with checkpointing and early stopping
pub mod trainer;

/// Loads a saved run and scores it
pub mod evaluator;
