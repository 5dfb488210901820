// ============================================================
// Layer 6: Metrics Logger
// ============================================================
// Two CSV files per training run:
//
//   metrics.csv  one row per epoch
//     epoch,lr,train_loss,train_acc,val_loss,val_acc
//   steps.csv    one row every log_interval optimizer steps
//     step,epoch,loss,acc
//
// Both files are recreated when a run starts, so a version
// directory always describes exactly one run. Epochs are 1-based.
// A validation pass with no batches leaves val_loss and val_acc
// empty in the row.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const EPOCH_HEADER: &str = "epoch,lr,train_loss,train_acc,val_loss,val_acc";
const STEP_HEADER:  &str = "step,epoch,loss,acc";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub lr:         f64,
    pub train_loss: f64,
    pub train_acc:  f64,
    /// None when the validation pass saw no batches
    pub val_loss:   Option<f64>,
    pub val_acc:    Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetrics {
    /// Global optimizer step, 1-based
    pub step:  usize,
    pub epoch: usize,
    pub loss:  f64,
    pub acc:   f64,
}

pub struct MetricsLogger {
    epoch_csv: PathBuf,
    step_csv:  PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let epoch_csv = dir.join("metrics.csv");
        let step_csv  = dir.join("steps.csv");
        write_header(&epoch_csv, EPOCH_HEADER)?;
        write_header(&step_csv, STEP_HEADER)?;

        tracing::debug!("Metrics CSVs ready in '{}'", dir.display());
        Ok(Self { epoch_csv, step_csv })
    }

    pub fn log_epoch(&self, m: &EpochMetrics) -> Result<()> {
        append_row(
            &self.epoch_csv,
            &format!(
                "{},{:.8},{:.6},{:.6},{},{}",
                m.epoch,
                m.lr,
                m.train_loss,
                m.train_acc,
                optional(m.val_loss),
                optional(m.val_acc),
            ),
        )?;
        tracing::debug!("Logged epoch {} metrics", m.epoch);
        Ok(())
    }

    pub fn log_step(&self, m: &StepMetrics) -> Result<()> {
        append_row(
            &self.step_csv,
            &format!("{},{},{:.6},{:.6}", m.step, m.epoch, m.loss, m.acc),
        )
    }
}

fn write_header(path: &Path, header: &str) -> Result<()> {
    let mut f = File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    writeln!(f, "{header}")?;
    Ok(())
}

fn append_row(path: &Path, row: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open '{}' for appending", path.display()))?;
    writeln!(f, "{row}")?;
    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(n: usize, val: Option<f64>) -> EpochMetrics {
        EpochMetrics { epoch: n, lr: 0.005, train_loss: 0.5, train_acc: 0.75, val_loss: val, val_acc: val }
    }

    #[test]
    fn test_epoch_rows_follow_header() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log_epoch(&epoch(1, Some(0.25))).unwrap();
        logger.log_epoch(&epoch(2, None)).unwrap();

        let text = fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], EPOCH_HEADER);
        assert_eq!(lines[1], "1,0.00500000,0.500000,0.750000,0.250000,0.250000");
        assert_eq!(lines[2], "2,0.00500000,0.500000,0.750000,,");
    }

    #[test]
    fn test_new_run_truncates_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        {
            let logger = MetricsLogger::new(dir.path()).unwrap();
            logger.log_step(&StepMetrics { step: 10, epoch: 1, loss: 1.0, acc: 0.5 }).unwrap();
        }
        MetricsLogger::new(dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join("steps.csv")).unwrap();
        assert_eq!(text.trim_end(), STEP_HEADER);
    }
}
