// ============================================================
// Layer 5: Learner
// ============================================================
// The adapter between a bare model and the fit loop. The loop
// only talks to the TrainableUnit trait:
//
//   configure_optimizer  → AdamW with weight decay and
//                          gradient-norm clipping
//   learning_rate(epoch) → base_lr · decay_lr^epoch
//   training_step        → loss tensor (kept on the autodiff
//                          graph) plus accuracy counts
//   validation_step      → same, on the inner backend
//
// Loss and accuracy are computed per time step and averaged over
// real steps only; padded steps carry a 0 in the batch mask.

use burn::{
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamWConfig, Optimizer},
    prelude::*,
    tensor::{activation::log_softmax, backend::AutodiffBackend},
};

use crate::data::batcher::SequenceBatch;
use crate::domain::params::TrainParams;
use crate::ml::model::CfcModel;

/// Result of one step. `loss` is the masked mean over real steps.
pub struct StepOutput<B: Backend> {
    pub loss:       Tensor<B, 1>,
    pub correct:    f64,
    pub real_steps: f64,
}

impl<B: Backend> StepOutput<B> {
    pub fn accuracy(&self) -> f64 {
        if self.real_steps > 0.0 { self.correct / self.real_steps } else { 0.0 }
    }
}

/// What the fit loop needs from a model-specific adapter.
pub trait TrainableUnit<B: AutodiffBackend> {
    type Model: AutodiffModule<B>;

    fn configure_optimizer(&self) -> impl Optimizer<Self::Model, B>;

    /// Learning rate for the 0-based `epoch`.
    fn learning_rate(&self, epoch: usize) -> f64;

    fn training_step(&self, model: &Self::Model, batch: SequenceBatch<B>) -> StepOutput<B>;

    fn validation_step(
        &self,
        model: &<Self::Model as AutodiffModule<B>>::InnerModule,
        batch: SequenceBatch<B::InnerBackend>,
    ) -> StepOutput<B::InnerBackend>;
}

#[derive(Debug, Clone)]
pub struct Learner {
    base_lr:           f64,
    decay_lr:          f64,
    weight_decay:      f64,
    gradient_clip_val: f64,
}

impl Learner {
    pub fn new(base_lr: f64, decay_lr: f64, weight_decay: f64, gradient_clip_val: f64) -> Self {
        Self { base_lr, decay_lr, weight_decay, gradient_clip_val }
    }

    pub fn from_params(params: &TrainParams) -> Self {
        Self::new(params.base_lr, params.decay_lr, params.weight_decay, params.gradient_clip_val)
    }
}

impl<B: AutodiffBackend> TrainableUnit<B> for Learner {
    type Model = CfcModel<B>;

    fn configure_optimizer(&self) -> impl Optimizer<CfcModel<B>, B> {
        AdamWConfig::new()
            .with_weight_decay(self.weight_decay as f32)
            .with_grad_clipping(Some(GradientClippingConfig::Norm(self.gradient_clip_val as f32)))
            .init()
    }

    fn learning_rate(&self, epoch: usize) -> f64 {
        self.base_lr * self.decay_lr.powi(epoch as i32)
    }

    fn training_step(&self, model: &CfcModel<B>, batch: SequenceBatch<B>) -> StepOutput<B> {
        score_batch(model, batch)
    }

    fn validation_step(
        &self,
        model: &CfcModel<B::InnerBackend>,
        batch: SequenceBatch<B::InnerBackend>,
    ) -> StepOutput<B::InnerBackend> {
        score_batch(model, batch)
    }
}

/// Forward pass plus masked loss and accuracy counts.
pub fn score_batch<B: Backend>(model: &CfcModel<B>, batch: SequenceBatch<B>) -> StepOutput<B> {
    let logits = model.forward(batch.inputs);
    let (correct, real_steps) = masked_correct(logits.clone(), batch.targets.clone(), batch.mask.clone());
    let loss = masked_cross_entropy(logits, batch.targets, batch.mask);
    StepOutput { loss, correct, real_steps }
}

/// Mean per-step cross entropy over steps where `mask` is 1.
///
/// logits: [batch, seq, classes], targets: [batch, seq], mask: [batch, seq]
pub fn masked_cross_entropy<B: Backend>(
    logits:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    mask:    Tensor<B, 2>,
) -> Tensor<B, 1> {
    let [batch_size, seq_len, classes] = logits.dims();
    let n = batch_size * seq_len;

    let log_probs = log_softmax(logits.reshape([n, classes]), 1);
    let picked = log_probs
        .gather(1, targets.reshape([n, 1]))
        .reshape([n]);
    let mask = mask.reshape([n]);

    let denom = mask.clone().sum().clamp_min(1.0);
    (picked.neg() * mask).sum() / denom
}

/// (correct real steps, real steps) for argmax predictions.
pub fn masked_correct<B: Backend>(
    logits:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    mask:    Tensor<B, 2>,
) -> (f64, f64) {
    let [batch_size, seq_len, _] = logits.dims();
    let n = batch_size * seq_len;

    let predictions = logits.argmax(2).reshape([n]);
    let hits = predictions.equal(targets.reshape([n])).float();
    let mask = mask.reshape([n]);

    let correct: f64 = (hits * mask.clone()).sum().into_scalar().elem::<f64>();
    let real:    f64 = mask.sum().into_scalar().elem::<f64>();
    (correct, real)
}
