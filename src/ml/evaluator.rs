// ============================================================
// Layer 5: Evaluator
// ============================================================
// Rebuilds the CfC model saved by a training run and scores it
// on a batch provider with the same masked loss and accuracy as
// the validation pass.

use anyhow::{ensure, Result};
use burn::prelude::*;

use crate::data::{batcher::SequenceBatch, provider::BatchProvider};
use crate::domain::{params::RunConfig, sequence::SequenceSample};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::learner::score_batch;
use crate::ml::model::{CfcConfig, CfcModel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss:       f64,
    pub accuracy:   f64,
    pub samples:    usize,
    pub real_steps: usize,
}

pub struct Evaluator<B: Backend> {
    model: CfcModel<B>,
}

impl<B: Backend> Evaluator<B> {
    pub fn new(model: CfcModel<B>) -> Self {
        Self { model }
    }

    /// Rebuild the architecture from `config` and load the best weights.
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        config:       &RunConfig,
        device:       &B::Device,
    ) -> Result<Self> {
        ensure!(
            config.model.in_features > 0,
            "Saved run config has in_features = 0; was it written by a training run?"
        );
        let model = CfcConfig::from_params(&config.model).init::<B>(device);
        let model = ckpt_manager.load_weights::<B, _>(model, device)?;
        tracing::info!("Model loaded from '{}'", ckpt_manager.weights_file::<B>().display());
        Ok(Self::new(model))
    }

    pub fn evaluate(&self, provider: &BatchProvider<SequenceSample, SequenceBatch<B>>) -> Evaluation {
        let mut weighted_loss = 0.0;
        let mut correct       = 0.0;
        let mut real_steps    = 0.0;

        for batch in provider.iter() {
            let output = score_batch(&self.model, batch);
            let loss: f64 = output.loss.into_scalar().elem::<f64>();
            weighted_loss += loss * output.real_steps;
            correct       += output.correct;
            real_steps    += output.real_steps;
        }

        let (loss, accuracy) = if real_steps > 0.0 {
            (weighted_loss / real_steps, correct / real_steps)
        } else {
            (f64::NAN, 0.0)
        };
        Evaluation { loss, accuracy, samples: provider.num_items(), real_steps: real_steps as usize }
    }
}
