// ============================================================
// Layer 5: Fit Loop
// ============================================================
// Runs a TrainableUnit over two batch providers:
//
//   for epoch in 0..max_epochs
//     lr = unit.learning_rate(epoch)
//     train pass   forward → masked loss → backward → AdamW step
//                  steps.csv row every log_interval global steps
//     valid pass   on model.valid() (inner backend, no autodiff)
//     metrics.csv  one row for the epoch
//     checkpoint   BestCheckpoint observes val_acc
//     stopping     EarlyStopping observes val_acc
//
// Epoch numbers shown to the user and written to artifacts are
// 1-based; the learning-rate schedule uses the 0-based index.
// An epoch whose validation pass yields no batches has no val_acc
// and neither policy sees it.
//
// Reference: Burn Book §5 (Custom Training Loop)

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{batcher::SequenceBatch, provider::BatchProvider};
use crate::domain::sequence::SequenceSample;
use crate::infra::{
    checkpoint::BestCheckpoint,
    metrics::{EpochMetrics, MetricsLogger, StepMetrics},
};
use crate::ml::early_stopping::{EarlyStopping, StoppingDecision};
use crate::ml::learner::{StepOutput, TrainableUnit};

/// Everything the loop consults besides the unit and the data.
pub struct FitPolicies {
    pub max_epochs:     usize,
    /// Write a steps.csv row every N global steps; 0 disables
    pub log_interval:   usize,
    pub checkpoint:     BestCheckpoint,
    pub early_stopping: EarlyStopping,
    pub metrics:        MetricsLogger,
}

#[derive(Debug)]
pub struct FitOutcome<M> {
    /// Model after the last completed epoch (not necessarily the best one)
    pub model:         M,
    pub best_score:    Option<f64>,
    pub best_epoch:    Option<usize>,
    pub epochs_run:    usize,
    pub stopped_early: bool,
}

/// Running totals weighted by real steps, so the epoch mean is the
/// mean over every unpadded step rather than a mean of batch means.
#[derive(Debug, Default, Clone, Copy)]
struct Meter {
    weighted_loss: f64,
    correct:       f64,
    real_steps:    f64,
    batches:       usize,
}

impl Meter {
    fn update(&mut self, loss: f64, correct: f64, real_steps: f64) {
        self.weighted_loss += loss * real_steps;
        self.correct       += correct;
        self.real_steps    += real_steps;
        self.batches       += 1;
    }

    fn loss(&self) -> f64 {
        if self.real_steps > 0.0 { self.weighted_loss / self.real_steps } else { f64::NAN }
    }

    fn accuracy(&self) -> f64 {
        if self.real_steps > 0.0 { self.correct / self.real_steps } else { 0.0 }
    }
}

pub fn fit<B, U>(
    unit:     &U,
    model:    U::Model,
    train:    &BatchProvider<SequenceSample, SequenceBatch<B>>,
    valid:    &BatchProvider<SequenceSample, SequenceBatch<B::InnerBackend>>,
    policies: &mut FitPolicies,
) -> Result<FitOutcome<U::Model>>
where
    B: AutodiffBackend,
    U: TrainableUnit<B>,
{
    let mut model = model;
    let mut optim = unit.configure_optimizer();
    let mut global_step   = 0usize;
    let mut epochs_run    = 0usize;
    let mut stopped_early = false;

    tracing::info!(
        "Fitting for up to {} epochs: {} train batches, {} validation batches per epoch",
        policies.max_epochs, train.num_batches(), valid.num_batches()
    );

    for epoch in 0..policies.max_epochs {
        let display_epoch = epoch + 1;
        let lr = unit.learning_rate(epoch);

        // ── Training pass ────────────────────────────────────────────────────
        let mut train_meter = Meter::default();
        for batch in train.iter() {
            let output = unit.training_step(&model, batch);
            let acc = output.accuracy();
            let StepOutput { loss, correct, real_steps } = output;
            let loss_value: f64 = loss.clone().into_scalar().elem::<f64>();
            train_meter.update(loss_value, correct, real_steps);
            global_step += 1;

            if policies.log_interval > 0 && global_step % policies.log_interval == 0 {
                policies.metrics.log_step(&StepMetrics {
                    step: global_step,
                    epoch: display_epoch,
                    loss: loss_value,
                    acc,
                })?;
                tracing::debug!("step {global_step}: loss={loss_value:.4} acc={acc:.4}");
            }

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);
        }

        // ── Validation pass ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let mut val_meter = Meter::default();
        for batch in valid.iter() {
            let output = unit.validation_step(&model_valid, batch);
            let loss_value: f64 = output.loss.into_scalar().elem::<f64>();
            val_meter.update(loss_value, output.correct, output.real_steps);
        }
        let (val_loss, val_acc) = if val_meter.batches > 0 {
            (Some(val_meter.loss()), Some(val_meter.accuracy()))
        } else {
            (None, None)
        };

        let row = EpochMetrics {
            epoch:      display_epoch,
            lr,
            train_loss: train_meter.loss(),
            train_acc:  train_meter.accuracy(),
            val_loss,
            val_acc,
        };
        policies.metrics.log_epoch(&row)?;
        println!(
            "Epoch {:>3}/{} | lr={:.2e} | train_loss={:.4} | train_acc={:.4} | val_loss={} | val_acc={}",
            display_epoch,
            policies.max_epochs,
            lr,
            row.train_loss,
            row.train_acc,
            fmt_optional(val_loss),
            fmt_optional(val_acc),
        );
        epochs_run = display_epoch;

        // ── Policies ─────────────────────────────────────────────────────────
        let Some(score) = val_acc else {
            tracing::warn!("Epoch {display_epoch}: validation produced no batches; no val_acc recorded");
            continue;
        };
        policies.checkpoint.observe::<B::InnerBackend, _>(&model_valid, display_epoch, score)?;
        match policies.early_stopping.check(score) {
            StoppingDecision::Stop => {
                stopped_early = true;
                break;
            }
            StoppingDecision::NoImprovement { count, remaining } => {
                tracing::debug!("Epoch {display_epoch}: no improvement for {count} epoch(s), {remaining} left");
            }
            StoppingDecision::NewBest => {}
        }
    }

    let best = policies.checkpoint.best();
    tracing::info!("Training finished after {epochs_run} epochs");
    Ok(FitOutcome {
        best_score: best.map(|b| b.score),
        best_epoch: best.map(|b| b.epoch),
        model,
        epochs_run,
        stopped_early,
    })
}

fn fmt_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}
