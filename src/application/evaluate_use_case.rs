// ============================================================
// Layer 2: EvaluateUseCase
// ============================================================
// Scores the best checkpoint of a finished run:
//
//   Step 1: Locate <ckpt_root>/<model_name>/version_<n>/
//   Step 2: Reload run_config.json (with derived in_features)
//   Step 3: Assemble the dataset with the saved max_seq_len
//   Step 4: Rebuild the model and load the best weights
//   Step 5: Masked loss / accuracy over every sample

use anyhow::{ensure, Result};
use burn::prelude::Backend;
use std::{path::PathBuf, sync::Arc};

use crate::data::{
    batcher::SequenceBatcher, dataset::SequenceDataset, loader::generate_data,
    provider::BatchProviderBuilder,
};
use crate::domain::params::RunConfig;
use crate::infra::checkpoint::{BestScore, CheckpointManager};
use crate::ml::{
    evaluator::{Evaluation, Evaluator},
    InferenceBackend,
};

#[derive(Debug, Clone)]
pub struct EvaluateReport {
    pub run_dir:    PathBuf,
    pub evaluation: Evaluation,
    /// best_score.json of the run, if one was written
    pub best:       Option<BestScore>,
}

pub struct EvaluateUseCase {
    dataset_dir: PathBuf,
    ckpt_root:   PathBuf,
    /// Only model_name and version are used, to find the run
    run:         RunConfig,
}

impl EvaluateUseCase {
    pub fn new(dataset_dir: impl Into<PathBuf>, ckpt_root: impl Into<PathBuf>, run: RunConfig) -> Self {
        Self { dataset_dir: dataset_dir.into(), ckpt_root: ckpt_root.into(), run }
    }

    pub fn execute(&self) -> Result<EvaluateReport> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        self.execute_on::<InferenceBackend>(&device)
    }

    pub fn execute_on<B: Backend>(&self, device: &B::Device) -> Result<EvaluateReport> {
        // ── Steps 1-2: Run directory and saved config ─────────────────────────
        let run_dir = self.run.run_dir(&self.ckpt_root);
        ensure!(
            run_dir.is_dir(),
            "No training run at '{}'. Have you run 'train' first?",
            run_dir.display()
        );
        let ckpt_manager = CheckpointManager::new(&run_dir, self.run.model_name.clone())?;
        let saved = ckpt_manager.load_config()?;

        // ── Step 3: Dataset ───────────────────────────────────────────────────
        let data = generate_data(&self.dataset_dir, saved.model.max_seq_len)?;
        println!("Dataset X shape: {:?}", data.shape_x());
        println!("Dataset Y shape: {:?}", data.shape_y());
        ensure!(!data.is_empty(), "No samples found in '{}'", self.dataset_dir.display());
        ensure!(
            data.feature_dim() == saved.model.in_features,
            "Dataset has {} features per step but the model was trained on {}",
            data.feature_dim(),
            saved.model.in_features
        );

        // ── Step 4: Model ─────────────────────────────────────────────────────
        let evaluator = Evaluator::<B>::from_checkpoint(&ckpt_manager, &saved, device)?;

        // ── Step 5: Score ─────────────────────────────────────────────────────
        let provider = BatchProviderBuilder::new(SequenceBatcher::<B>::new(device.clone()))
            .batch_size(saved.train.batch_size)
            .num_workers(saved.train.num_workers)
            .build(SequenceDataset::full(Arc::new(data)))?;
        let evaluation = evaluator.evaluate(&provider);
        tracing::info!(
            "Evaluated {} samples ({} real steps)",
            evaluation.samples, evaluation.real_steps
        );

        let best = ckpt_manager.load_best_score().ok();
        Ok(EvaluateReport { run_dir, evaluation, best })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainUseCase;
    use crate::data::fixtures::write_synthetic_dataset;
    use burn::backend::{Autodiff, NdArray};

    fn small_config() -> RunConfig {
        let mut config = RunConfig::default();
        config.train.batch_size = 4;
        config.train.num_workers = 0;
        config.train.max_epochs = 1;
        config.model.units = 4;
        config.model.backbone_units = 4;
        config.model.max_seq_len = 4;
        config
    }

    #[test]
    fn test_evaluates_trained_run() {
        let data_dir = tempfile::tempdir().unwrap();
        let ckpt_dir = tempfile::tempdir().unwrap();
        write_synthetic_dataset(data_dir.path(), 6, 4, 2, 2);

        TrainUseCase::new(data_dir.path(), ckpt_dir.path(), small_config())
            .execute_on::<Autodiff<NdArray<f32>>>(&Default::default())
            .unwrap();

        let report = EvaluateUseCase::new(data_dir.path(), ckpt_dir.path(), RunConfig::default())
            .execute_on::<NdArray<f32>>(&Default::default())
            .unwrap();
        assert_eq!(report.evaluation.samples, 6);
        assert_eq!(report.evaluation.real_steps, 24);
        assert_eq!(report.best.map(|b| b.epoch), Some(1));
    }

    #[test]
    fn test_missing_run_is_reported() {
        let data_dir = tempfile::tempdir().unwrap();
        let ckpt_dir = tempfile::tempdir().unwrap();
        let err = EvaluateUseCase::new(data_dir.path(), ckpt_dir.path(), RunConfig::default())
            .execute_on::<NdArray<f32>>(&Default::default())
            .unwrap_err();
        assert!(err.to_string().contains("train"));
    }
}
