// ============================================================
// Layer 3: Run Parameters
// ============================================================
// The two configuration records that drive a training run:
//
//   TrainParams   data split, batching, optimiser and stopping
//   ModelParams   CfC architecture and sequence bound
//
// RunConfig bundles them with the run identity (model name and
// version) that decides where artifacts are written:
//
//   <ckpt_root>/<model_name>/version_<version>/
//
// Every struct uses #[serde(default)] so a JSON config file only
// needs the keys it wants to override.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the metric monitored by checkpointing and early stopping.
pub const MONITORED_METRIC: &str = "val_acc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    pub batch_size:          usize,
    /// Background batch workers; 0 collates on the training thread
    pub num_workers:         usize,
    /// Fraction of samples assigned to training (floor), rest validates
    pub train_ratio:         f64,
    pub base_lr:             f64,
    /// Per-epoch multiplicative learning-rate decay
    pub decay_lr:            f64,
    pub weight_decay:        f64,
    pub max_epochs:          usize,
    pub early_stop_patience: usize,
    /// Log a training step every N global steps (0 disables)
    pub log_interval:        usize,
    /// Gradient L2-norm clipping threshold
    pub gradient_clip_val:   f64,
    /// Seeds the split, the per-epoch shuffle and the backend RNG
    pub seed:                u64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            batch_size:          32,
            num_workers:         4,
            train_ratio:         0.8,
            base_lr:             5e-3,
            decay_lr:            0.95,
            weight_decay:        1e-6,
            max_epochs:          100,
            early_stop_patience: 10,
            log_interval:        10,
            gradient_clip_val:   1.0,
            seed:                42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Derived from the dataset at runtime; any configured value is overwritten
    pub in_features:     usize,
    /// Number of classes predicted at every time step
    pub out_features:    usize,
    /// Hidden state size of the CfC cell
    pub units:           usize,
    pub backbone_units:  usize,
    pub backbone_layers: usize,
    /// Sequences are truncated or padded to this many steps
    pub max_seq_len:     usize,
    /// Elapsed time fed to the closed-form gate at every step
    pub timespan:        f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            in_features:     0,
            out_features:    2,
            units:           64,
            backbone_units:  64,
            backbone_layers: 1,
            max_seq_len:     128,
            timespan:        1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub model_name: String,
    pub version:    u32,
    pub train:      TrainParams,
    pub model:      ModelParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model_name: "cfc".to_string(),
            version:    1,
            train:      TrainParams::default(),
            model:      ModelParams::default(),
        }
    }
}

impl RunConfig {
    /// Directory holding the checkpoint and logs of this run.
    pub fn run_dir(&self, ckpt_root: &Path) -> PathBuf {
        ckpt_root
            .join(&self.model_name)
            .join(format!("version_{}", self.version))
    }

    /// Reject values that would make the pipeline meaningless.
    /// `in_features` is not checked here because it is derived later.
    pub fn validate(&self) -> Result<()> {
        let t = &self.train;
        let m = &self.model;
        ensure!(!self.model_name.trim().is_empty(), "model_name must not be empty");
        ensure!(
            (0.0..=1.0).contains(&t.train_ratio),
            "train_ratio must be within [0, 1], got {}",
            t.train_ratio
        );
        ensure!(t.batch_size > 0, "batch_size must be greater than 0");
        ensure!(t.base_lr > 0.0, "base_lr must be positive, got {}", t.base_lr);
        ensure!(t.decay_lr > 0.0, "decay_lr must be positive, got {}", t.decay_lr);
        ensure!(t.weight_decay >= 0.0, "weight_decay must not be negative");
        ensure!(t.gradient_clip_val > 0.0, "gradient_clip_val must be positive");
        ensure!(m.out_features > 0, "out_features must be greater than 0");
        ensure!(m.units > 0, "units must be greater than 0");
        ensure!(
            m.backbone_layers == 0 || m.backbone_units > 0,
            "backbone_units must be greater than 0 when backbone_layers > 0"
        );
        ensure!(m.max_seq_len > 0, "max_seq_len must be greater than 0");
        Ok(())
    }
}
