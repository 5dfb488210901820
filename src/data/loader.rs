// ============================================================
// Layer 4: Sample Loader
// ============================================================
// Assembles the in-memory dataset from a directory of
// .safetensors files.
//
// Each file holds two tensors:
//
//   x: F32 (or F64)       [seq, feat]   one sample
//                         [n, seq, feat] n samples
//   y: I64 / I32 / U8     [seq]         one sample
//                         [n, seq]      n samples
//
// Files are read in file-name order so the dataset order (and
// therefore the seeded split) is reproducible. Every sequence is
// fitted to max_seq_len by SequenceFitter.
//
// A missing directory is an error. A directory with no sample
// files yields an empty dataset, which the training use case
// rejects with the sample count in the message.

use anyhow::{bail, ensure, Context, Result};
use safetensors::{tensor::TensorView, Dtype, SafeTensors};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::padding::SequenceFitter;
use crate::domain::sequence::SequenceData;
use crate::domain::traits::SampleSource;

const SAMPLE_EXTENSION: &str = "safetensors";
const FEATURES_KEY: &str = "x";
const LABELS_KEY: &str = "y";

/// Load every sample under `dataset_dir`, fitted to `max_seq_len` steps.
pub fn generate_data(dataset_dir: impl AsRef<Path>, max_seq_len: usize) -> Result<SequenceData> {
    SafetensorsLoader::new(dataset_dir.as_ref(), max_seq_len).load_all()
}

pub struct SafetensorsLoader {
    dir:         PathBuf,
    max_seq_len: usize,
}

impl SafetensorsLoader {
    pub fn new(dir: impl Into<PathBuf>, max_seq_len: usize) -> Self {
        Self { dir: dir.into(), max_seq_len }
    }

    fn sample_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read dataset directory '{}'", self.dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(SAMPLE_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl SampleSource for SafetensorsLoader {
    fn load_all(&self) -> Result<SequenceData> {
        ensure!(self.max_seq_len > 0, "max_seq_len must be greater than 0");

        let files  = self.sample_files()?;
        let fitter = SequenceFitter::new(self.max_seq_len);

        let mut feature_dim: Option<(usize, &Path)> = None;
        let mut samples = Vec::new();

        for path in &files {
            let block = read_sample_file(path)?;

            match feature_dim {
                Some((dim, first)) => ensure!(
                    dim == block.feature_dim,
                    "Feature dimension mismatch: '{}' has {} features but '{}' has {}",
                    path.display(),
                    block.feature_dim,
                    first.display(),
                    dim
                ),
                None => feature_dim = Some((block.feature_dim, path.as_path())),
            }

            for i in 0..block.count {
                samples.push(fitter.fit(block.features_of(i), block.labels_of(i), block.feature_dim));
            }

            tracing::debug!(
                "Loaded {} sample(s) of {} steps from '{}'",
                block.count,
                block.steps,
                path.display()
            );
        }

        let feature_dim = feature_dim.map(|(dim, _)| dim).unwrap_or(0);
        tracing::info!(
            "Assembled {} samples from {} file(s) in '{}'",
            samples.len(),
            files.len(),
            self.dir.display()
        );
        Ok(SequenceData::new(samples, self.max_seq_len, feature_dim))
    }
}

/// The contents of one file, before fitting.
struct SampleBlock {
    count:       usize,
    steps:       usize,
    feature_dim: usize,
    features:    Vec<f32>,
    labels:      Vec<i64>,
}

impl SampleBlock {
    fn features_of(&self, i: usize) -> &[f32] {
        let len = self.steps * self.feature_dim;
        &self.features[i * len..(i + 1) * len]
    }

    fn labels_of(&self, i: usize) -> &[i64] {
        &self.labels[i * self.steps..(i + 1) * self.steps]
    }
}

fn read_sample_file(path: &Path) -> Result<SampleBlock> {
    let bytes = fs::read(path).with_context(|| format!("Cannot read '{}'", path.display()))?;
    let tensors = SafeTensors::deserialize(&bytes)
        .with_context(|| format!("'{}' is not a valid safetensors file", path.display()))?;

    let x = tensors
        .tensor(FEATURES_KEY)
        .with_context(|| format!("'{}' has no '{FEATURES_KEY}' tensor", path.display()))?;
    let y = tensors
        .tensor(LABELS_KEY)
        .with_context(|| format!("'{}' has no '{LABELS_KEY}' tensor", path.display()))?;

    let (count, steps, feature_dim) = match *x.shape() {
        [steps, feat]         => (1, steps, feat),
        [count, steps, feat]  => (count, steps, feat),
        ref other => bail!(
            "'{}': '{FEATURES_KEY}' must be 2-D or 3-D, got shape {:?}",
            path.display(),
            other
        ),
    };
    let (label_count, label_steps) = match *y.shape() {
        [steps]        => (1, steps),
        [count, steps] => (count, steps),
        ref other => bail!(
            "'{}': '{LABELS_KEY}' must be 1-D or 2-D, got shape {:?}",
            path.display(),
            other
        ),
    };
    ensure!(
        count == label_count,
        "'{}': {} input samples but {} target samples",
        path.display(),
        count,
        label_count
    );
    ensure!(
        steps == label_steps,
        "'{}': inputs have {} steps but targets have {}",
        path.display(),
        steps,
        label_steps
    );

    let features = decode_features(&x).with_context(|| format!("'{}'", path.display()))?;
    let labels   = decode_labels(&y).with_context(|| format!("'{}'", path.display()))?;
    if let Some(bad) = labels.iter().find(|&&l| l < 0) {
        bail!("'{}': negative class label {}", path.display(), bad);
    }

    Ok(SampleBlock { count, steps, feature_dim, features, labels })
}

// safetensors stores little-endian data with no alignment guarantee,
// so values are decoded byte-wise.
fn decode_features(view: &TensorView<'_>) -> Result<Vec<f32>> {
    let data = view.data();
    match view.dtype() {
        Dtype::F32 => Ok(data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()),
        Dtype::F64 => Ok(data
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect()),
        other => bail!("unsupported feature dtype {:?}, expected F32 or F64", other),
    }
}

fn decode_labels(view: &TensorView<'_>) -> Result<Vec<i64>> {
    let data = view.data();
    match view.dtype() {
        Dtype::I64 => Ok(data
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect()),
        Dtype::I32 => Ok(data
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64)
            .collect()),
        Dtype::U8 => Ok(data.iter().map(|&b| b as i64).collect()),
        other => bail!("unsupported label dtype {:?}, expected I64, I32 or U8", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{write_sample_file, write_synthetic_dataset};

    #[test]
    fn test_batched_file_shapes() {
        let dir = tempfile::tempdir().unwrap();
        write_synthetic_dataset(dir.path(), 10, 5, 3, 2);

        let data = generate_data(dir.path(), 5).unwrap();
        assert_eq!(data.shape_x(), [10, 5, 3]);
        assert_eq!(data.shape_y(), [10, 5]);
    }

    #[test]
    fn test_single_sample_files_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_file(&dir.path().join("a.safetensors"), &[1.0, 2.0], &[2, 1], &[1, 0], &[2]);
        write_sample_file(&dir.path().join("b.safetensors"), &[3.0; 4], &[4, 1], &[1; 4], &[4]);

        let data = generate_data(dir.path(), 3).unwrap();
        assert_eq!(data.shape_x(), [2, 3, 1]);

        // file-name order: a before b
        let a = data.get(0).unwrap();
        assert_eq!(a.valid_len, 2);
        assert_eq!(a.features, vec![1.0, 2.0, 0.0]);
        let b = data.get(1).unwrap();
        assert_eq!(b.valid_len, 3);
        assert_eq!(b.labels, vec![1, 1, 1]);
    }

    #[test]
    fn test_other_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "not a tensor").unwrap();

        let data = generate_data(dir.path(), 4).unwrap();
        assert!(data.is_empty());
        assert_eq!(data.shape_y(), [0, 4]);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_data(dir.path().join("absent"), 4).unwrap_err();
        assert!(err.to_string().contains("Cannot read dataset directory"));
    }

    #[test]
    fn test_mismatched_sample_counts_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_file(
            &dir.path().join("bad.safetensors"),
            &[0.0; 12],
            &[2, 3, 2],
            &[0; 9],
            &[3, 3],
        );
        let err = format!("{:#}", generate_data(dir.path(), 3).unwrap_err());
        assert!(err.contains("2 input samples but 3 target samples"));
    }

    #[test]
    fn test_feature_dim_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_file(&dir.path().join("a.safetensors"), &[0.0; 4], &[2, 2], &[0, 0], &[2]);
        write_sample_file(&dir.path().join("b.safetensors"), &[0.0; 6], &[2, 3], &[0, 0], &[2]);
        let err = generate_data(dir.path(), 2).unwrap_err().to_string();
        assert!(err.contains("Feature dimension mismatch"));
    }

    #[test]
    fn test_negative_label_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_file(&dir.path().join("a.safetensors"), &[0.0; 2], &[2, 1], &[0, -1], &[2]);
        let err = generate_data(dir.path(), 2).unwrap_err().to_string();
        assert!(err.contains("negative class label"));
    }
}
