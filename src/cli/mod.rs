// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2.
//
//   cfc-trainer                 train with default paths/config
//   cfc-trainer train  [flags]
//   cfc-trainer evaluate [flags]
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

use crate::infra::config_file::load_run_config;

#[derive(Parser, Debug)]
#[command(
    name = "cfc-trainer",
    version,
    about = "Train a closed-form continuous-time (CfC) network on sequence tensors."
)]
pub struct Cli {
    /// Defaults to `train` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command.unwrap_or_else(|| Commands::Train(TrainArgs::default())) {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let config = load_run_config(args.run.config.as_deref())?;
    tracing::info!("Starting training on samples in '{}'", args.run.dataset_dir.display());

    let report = TrainUseCase::new(args.run.dataset_dir, args.run.ckpt_dir, config).execute()?;

    println!(
        "Trained on {} samples, validated on {} samples, {} epochs run.",
        report.train_samples, report.valid_samples, report.epochs_run
    );
    if report.stopped_early {
        println!("Stopped early after {} epochs.", report.epochs_run);
    }
    match (report.best_score, report.best_epoch) {
        (Some(score), Some(epoch)) => {
            println!("Best validation accuracy: {score:.4}");
            println!("Best epoch {epoch}, checkpoint in '{}'", report.run_dir.display());
        }
        _ => println!("No validation score was recorded; no checkpoint was saved."),
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let config = load_run_config(args.run.config.as_deref())?;
    let report = EvaluateUseCase::new(args.run.dataset_dir, args.run.ckpt_dir, config).execute()?;

    let eval = report.evaluation;
    println!("Run: {}", report.run_dir.display());
    if let Some(best) = &report.best {
        println!("Best {} during training: {:.4} (epoch {})", best.monitor, best.score, best.epoch);
    }
    println!(
        "Evaluated {} samples ({} real steps): loss={:.4} accuracy={:.4}",
        eval.samples, eval.real_steps, eval.loss, eval.accuracy
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_train() {
        let cli = Cli::try_parse_from(["cfc-trainer"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_train_flags() {
        let cli = Cli::try_parse_from([
            "cfc-trainer", "train", "--dataset-dir", "data", "--config", "run.json",
        ])
        .unwrap();
        let Some(Commands::Train(args)) = cli.command else { panic!("expected train") };
        assert_eq!(args.run.dataset_dir, std::path::PathBuf::from("data"));
        assert_eq!(args.run.config.as_deref(), Some(std::path::Path::new("run.json")));
        assert_eq!(args.run.ckpt_dir, std::path::PathBuf::from("ckpt"));
    }

    #[test]
    fn test_default_args_match_flag_defaults() {
        let cli = Cli::try_parse_from(["cfc-trainer", "evaluate"]).unwrap();
        let Some(Commands::Evaluate(args)) = cli.command else { panic!("expected evaluate") };
        let defaults = commands::RunArgs::default();
        assert_eq!(args.run.dataset_dir, defaults.dataset_dir);
        assert_eq!(args.run.ckpt_dir, defaults.ckpt_dir);
    }
}
