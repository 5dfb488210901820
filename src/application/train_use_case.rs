// ============================================================
// Layer 2: TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Assemble the dataset          (Layer 4 - data)
//   Step 2: Print X / Y shapes, derive in_features
//   Step 3: Reject datasets with < 2 samples or 0 features
//   Step 4: Seeded train/validation split (Layer 4 - data)
//   Step 5: Batch providers               (Layer 4 - data)
//   Step 6: Model + Learner               (Layer 5 - ml)
//   Step 7: Checkpoint, early stopping,
//           metrics logger                (Layer 6 - infra)
//   Step 8: Fit loop                      (Layer 5 - ml)
//
// Steps 1-4 are `prepare`, so they can be checked without a
// device. `execute` runs everything on the Wgpu training backend;
// `execute_on` takes any autodiff backend.

use anyhow::{ensure, Result};
use burn::{module::Module, tensor::backend::AutodiffBackend};
use std::{path::PathBuf, sync::Arc};

use crate::data::{
    batcher::SequenceBatcher,
    dataset::SequenceDataset,
    loader::generate_data,
    provider::BatchProviderBuilder,
    splitter::{split_train_val, SplitPlan},
};
use crate::domain::{
    params::{RunConfig, MONITORED_METRIC},
    sequence::SequenceData,
};
use crate::infra::{
    checkpoint::{BestCheckpoint, CheckpointManager},
    metrics::MetricsLogger,
};
use crate::ml::{
    early_stopping::{EarlyStopping, MonitorMode},
    learner::Learner,
    model::CfcConfig,
    trainer::{fit, FitPolicies},
    TrainingBackend,
};

const MIN_SAMPLES: usize = 2;

/// Dataset and split ready for training, with `in_features` filled in.
#[derive(Debug)]
pub struct PreparedRun {
    pub config: RunConfig,
    pub data:   Arc<SequenceData>,
    pub split:  SplitPlan,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub run_dir:       PathBuf,
    pub train_samples: usize,
    pub valid_samples: usize,
    pub best_score:    Option<f64>,
    pub best_epoch:    Option<usize>,
    pub epochs_run:    usize,
    pub stopped_early: bool,
}

pub struct TrainUseCase {
    dataset_dir: PathBuf,
    ckpt_root:   PathBuf,
    config:      RunConfig,
}

impl TrainUseCase {
    pub fn new(dataset_dir: impl Into<PathBuf>, ckpt_root: impl Into<PathBuf>, config: RunConfig) -> Self {
        Self { dataset_dir: dataset_dir.into(), ckpt_root: ckpt_root.into(), config }
    }

    pub fn prepare(&self) -> Result<PreparedRun> {
        let mut config = self.config.clone();
        config.validate()?;

        // ── Step 1: Assemble the dataset ──────────────────────────────────────
        tracing::info!("Loading samples from '{}'", self.dataset_dir.display());
        let data = generate_data(&self.dataset_dir, config.model.max_seq_len)?;

        // ── Step 2: Shapes and in_features ────────────────────────────────────
        println!("Dataset X shape: {:?}", data.shape_x());
        println!("Dataset Y shape: {:?}", data.shape_y());
        config.model.in_features = data.feature_dim();

        // ── Step 3: Size check ────────────────────────────────────────────────
        ensure!(
            data.len() >= MIN_SAMPLES,
            "Dataset too small: {} samples. Need at least {} samples for training and validation.",
            data.len(),
            MIN_SAMPLES
        );
        ensure!(
            data.feature_dim() > 0,
            "Samples have 0 features per step; at least one feature is required"
        );
        if let Some(max_label) = data.max_label() {
            ensure!(
                max_label < config.model.out_features as i64,
                "Label {} found but out_features is {}; labels must be in [0, out_features)",
                max_label,
                config.model.out_features
            );
        }

        // ── Step 4: Split ─────────────────────────────────────────────────────
        let split = split_train_val(data.len(), config.train.train_ratio, config.train.seed)?;
        tracing::info!("Split: {} train, {} validation", split.train.len(), split.valid.len());
        if split.valid.is_empty() {
            tracing::warn!("Validation subset is empty; no checkpoint will be written");
        }

        Ok(PreparedRun { config, data: Arc::new(data), split })
    }

    /// Train on the default Wgpu device.
    pub fn execute(&self) -> Result<TrainReport> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        self.execute_on::<TrainingBackend>(&device)
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: &B::Device) -> Result<TrainReport> {
        let PreparedRun { config, data, split } = self.prepare()?;
        let train_params = &config.train;
        B::seed(train_params.seed);

        // ── Step 5: Batch providers ───────────────────────────────────────────
        let train_samples = split.train.len();
        let valid_samples = split.valid.len();
        let train_provider = BatchProviderBuilder::new(SequenceBatcher::<B>::new(device.clone()))
            .batch_size(train_params.batch_size)
            .shuffle(train_params.seed)
            .num_workers(train_params.num_workers)
            .build(SequenceDataset::new(data.clone(), split.train))?;
        let valid_provider = BatchProviderBuilder::new(SequenceBatcher::<B::InnerBackend>::new(device.clone()))
            .batch_size(train_params.batch_size)
            .num_workers(train_params.num_workers)
            .build(SequenceDataset::new(data, split.valid))?;

        // ── Step 6: Model and learner ─────────────────────────────────────────
        let model = CfcConfig::from_params(&config.model).init::<B>(device);
        let learner = Learner::from_params(train_params);
        tracing::info!(
            "CfC model ready: {} -> {} units -> {} classes, {} parameters",
            config.model.in_features, config.model.units, config.model.out_features, model.num_params()
        );

        // ── Step 7: Policies ──────────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::for_run(&self.ckpt_root, &config)?;
        ckpt_manager.save_config(&config)?;
        let run_dir = ckpt_manager.dir().to_path_buf();
        let mode = MonitorMode::for_metric(MONITORED_METRIC);
        let mut policies = FitPolicies {
            max_epochs:     train_params.max_epochs,
            log_interval:   train_params.log_interval,
            metrics:        MetricsLogger::new(&run_dir)?,
            checkpoint:     BestCheckpoint::new(ckpt_manager, MONITORED_METRIC, mode),
            early_stopping: EarlyStopping::new(MONITORED_METRIC, mode, train_params.early_stop_patience)
                .with_verbose(true),
        };

        // ── Step 8: Fit ───────────────────────────────────────────────────────
        let outcome = fit(&learner, model, &train_provider, &valid_provider, &mut policies)?;

        Ok(TrainReport {
            run_dir,
            train_samples,
            valid_samples,
            best_score:    outcome.best_score,
            best_epoch:    outcome.best_epoch,
            epochs_run:    outcome.epochs_run,
            stopped_early: outcome.stopped_early,
        })
    }
}
