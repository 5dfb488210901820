// Test-only helpers that write sample files in the loader's format.

use safetensors::{tensor::TensorView, Dtype};
use std::path::Path;

pub fn write_sample_file(path: &Path, x: &[f32], x_shape: &[usize], y: &[i64], y_shape: &[usize]) {
    let x_bytes: Vec<u8> = x.iter().flat_map(|v| v.to_le_bytes()).collect();
    let y_bytes: Vec<u8> = y.iter().flat_map(|v| v.to_le_bytes()).collect();

    let x_view = TensorView::new(Dtype::F32, x_shape.to_vec(), &x_bytes).unwrap();
    let y_view = TensorView::new(Dtype::I64, y_shape.to_vec(), &y_bytes).unwrap();

    let bytes = safetensors::serialize(vec![("x", &x_view), ("y", &y_view)], &None).unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// One file holding `samples` sequences. Labels are learnable: the class is
/// 1 when the first feature of the step is positive.
pub fn write_synthetic_dataset(
    dir: &Path,
    samples: usize,
    seq_len: usize,
    feature_dim: usize,
    classes: i64,
) {
    let mut x = Vec::with_capacity(samples * seq_len * feature_dim);
    let mut y = Vec::with_capacity(samples * seq_len);
    for s in 0..samples {
        for t in 0..seq_len {
            let sign = if (s + t) % 2 == 0 { 1.0 } else { -1.0 };
            for f in 0..feature_dim {
                x.push(sign * (1.0 + f as f32 * 0.1));
            }
            y.push(if sign > 0.0 { 1 % classes } else { 0 });
        }
    }
    write_sample_file(
        &dir.join("synthetic.safetensors"),
        &x,
        &[samples, seq_len, feature_dim],
        &y,
        &[samples, seq_len],
    );
}
