// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Two subcommands, `train` (the default) and `evaluate`.
// Hyper-parameters live in the optional JSON run config, so
// the flags only locate inputs and outputs.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a CfC model on the sample files (default)
    Train(TrainArgs),

    /// Score the best checkpoint of a finished run
    Evaluate(EvaluateArgs),
}

/// Flags shared by both commands.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory containing .safetensors sample files
    #[arg(long, default_value = "dataset")]
    pub dataset_dir: PathBuf,

    /// JSON run config; missing keys take built-in defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Root directory for run artifacts (<ckpt-dir>/<model_name>/version_<n>)
    #[arg(long, default_value = "ckpt")]
    pub ckpt_dir: PathBuf,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("dataset"),
            config:      None,
            ckpt_dir:    PathBuf::from("ckpt"),
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Debug, Default)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub run: RunArgs,
}
