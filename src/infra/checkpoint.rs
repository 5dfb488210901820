// ============================================================
// Layer 6: Checkpoints
// ============================================================
// One directory per run: <ckpt_root>/<model_name>/version_<n>/
//
//   <model_name>-best.mpk.gz  weights of the best epoch
//   best_score.json           { epoch, score, monitor }
//   run_config.json           effective RunConfig
//
// Weights go through WeightsRecorder: named MessagePack, gzip
// compressed, half precision. Only weights are stored: the model
// is rebuilt from run_config.json and the record loaded into it.
//
// BestCheckpoint keeps a single file. It overwrites the weights
// and best_score.json only when the monitored value strictly
// improves on the best seen so far in this run.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FileRecorder, HalfPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::params::RunConfig;
use crate::ml::early_stopping::MonitorMode;

const CONFIG_FILE:     &str = "run_config.json";
const BEST_SCORE_FILE: &str = "best_score.json";

/// Recorder for model weights; files end in `.mpk.gz`.
pub type WeightsRecorder = NamedMpkGzFileRecorder<HalfPrecisionSettings>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestScore {
    /// 1-based epoch that produced the score
    pub epoch:   usize,
    pub score:   f64,
    pub monitor: String,
}

/// Reads and writes the artifacts of one run directory.
pub struct CheckpointManager {
    dir:        PathBuf,
    model_name: String,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>, model_name: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, model_name: model_name.into() })
    }

    /// Manager for `<ckpt_root>/<model_name>/version_<n>/`.
    pub fn for_run(ckpt_root: &Path, config: &RunConfig) -> Result<Self> {
        Self::new(config.run_dir(ckpt_root), config.model_name.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Weights path without extension; the recorder appends it.
    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(format!("{}-best", self.model_name))
    }

    /// Weights path as it lands on disk.
    pub fn weights_file<B: Backend>(&self) -> PathBuf {
        self.weights_path()
            .with_extension(<WeightsRecorder as FileRecorder<B>>::file_extension())
    }

    pub fn save_weights<B: Backend, M: Module<B>>(&self, model: &M) -> Result<()> {
        let path = self.weights_file::<B>();
        Recorder::<B>::record(&WeightsRecorder::default(), model.clone().into_record(), self.weights_path())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        tracing::debug!("Saved weights to '{}'", path.display());
        Ok(())
    }

    /// Load the best weights into `model`, which must have the saved architecture.
    pub fn load_weights<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let path = self.weights_file::<B>();
        let record = Recorder::<B>::load(&WeightsRecorder::default(), self.weights_path(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Has this run been trained?", path.display())
            })?;
        Ok(model.load_record(record))
    }

    pub fn save_config(&self, config: &RunConfig) -> Result<()> {
        write_json(&self.dir.join(CONFIG_FILE), config)
    }

    pub fn load_config(&self) -> Result<RunConfig> {
        read_json(&self.dir.join(CONFIG_FILE))
    }

    pub fn save_best_score(&self, best: &BestScore) -> Result<()> {
        write_json(&self.dir.join(BEST_SCORE_FILE), best)
    }

    pub fn load_best_score(&self) -> Result<BestScore> {
        read_json(&self.dir.join(BEST_SCORE_FILE))
    }
}

/// Save-best-only checkpoint policy.
pub struct BestCheckpoint {
    manager: CheckpointManager,
    monitor: String,
    mode:    MonitorMode,
    best:    Option<BestScore>,
}

impl BestCheckpoint {
    pub fn new(manager: CheckpointManager, monitor: impl Into<String>, mode: MonitorMode) -> Self {
        Self { manager, monitor: monitor.into(), mode, best: None }
    }

    /// Saves `model` when `score` beats the best so far. Returns whether it did.
    pub fn observe<B: Backend, M: Module<B>>(&mut self, model: &M, epoch: usize, score: f64) -> Result<bool> {
        let improved = match &self.best {
            None       => !score.is_nan(),
            Some(best) => self.mode.improves(score, best.score),
        };
        if !improved {
            return Ok(false);
        }

        let best = BestScore { epoch, score, monitor: self.monitor.clone() };
        self.manager.save_weights::<B, M>(model)?;
        self.manager.save_best_score(&best)?;
        tracing::info!(
            "Epoch {}: {} reached {:.4}, saved '{}'",
            epoch, self.monitor, score, self.manager.weights_file::<B>().display()
        );
        self.best = Some(best);
        Ok(true)
    }

    pub fn best(&self) -> Option<&BestScore> {
        self.best.as_ref()
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).with_context(|| {
        format!("Cannot read '{}'. Make sure you have run 'train' first.", path.display())
    })?;
    serde_json::from_str(&json).with_context(|| format!("Malformed JSON in '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{CfcConfig, CfcModel};
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn tiny_model() -> CfcModel<TestBackend> {
        CfcConfig::new(2, 2, 4).with_backbone_units(4).init(&Default::default())
    }

    #[test]
    fn test_config_roundtrip_and_layout() {
        let root = tempfile::tempdir().unwrap();
        let mut config = RunConfig::default();
        config.version = 3;
        config.model.in_features = 5;

        let manager = CheckpointManager::for_run(root.path(), &config).unwrap();
        assert_eq!(manager.dir(), root.path().join("cfc").join("version_3"));

        manager.save_config(&config).unwrap();
        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.model.in_features, 5);
        assert_eq!(loaded.version, 3);
    }

    #[test]
    fn test_missing_config_mentions_train() {
        let root = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(root.path(), "cfc").unwrap();
        let err = manager.load_config().unwrap_err();
        assert!(format!("{err:#}").contains("train"));
    }

    #[test]
    fn test_best_only_on_strict_improvement() {
        let root = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(root.path(), "cfc").unwrap();
        let mut ckpt = BestCheckpoint::new(manager, "val_acc", MonitorMode::Max);
        let model = tiny_model();

        assert!(ckpt.observe::<TestBackend, _>(&model, 1, 0.5).unwrap());
        assert!(!ckpt.observe::<TestBackend, _>(&model, 2, 0.5).unwrap());
        assert!(ckpt.observe::<TestBackend, _>(&model, 3, 0.7).unwrap());
        assert!(!ckpt.observe::<TestBackend, _>(&model, 4, 0.6).unwrap());

        let manager = CheckpointManager::new(root.path(), "cfc").unwrap();
        let best = manager.load_best_score().unwrap();
        assert_eq!(best, BestScore { epoch: 3, score: 0.7, monitor: "val_acc".into() });
        assert!(manager.weights_file::<TestBackend>().exists());

        let files = fs::read_dir(root.path()).unwrap().count();
        assert_eq!(files, 2);
    }

    #[test]
    fn test_weights_reload_into_fresh_model() {
        let root = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(root.path(), "cfc").unwrap();
        let device = Default::default();
        let model = tiny_model();
        manager.save_weights::<TestBackend, _>(&model).unwrap();
        assert_eq!(
            manager.weights_file::<TestBackend>(),
            root.path().join("cfc-best.mpk.gz")
        );
        assert!(manager.weights_file::<TestBackend>().exists());

        let restored = manager.load_weights::<TestBackend, _>(tiny_model(), &device).unwrap();
        let inputs = Tensor::<TestBackend, 3>::ones([1, 3, 2], &device);
        let a: Vec<f32> = model.forward(inputs.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = restored.forward(inputs).into_data().to_vec().unwrap();
        // half-precision storage
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 5e-2, "{x} vs {y}");
        }
    }
}
