#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

fn main() -> Result<()> {
    let crate_directive = format!("{}={}", env!("CARGO_CRATE_NAME"), LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(crate_directive.parse()?))
        .init();

    let cli = Cli::parse();
    cli.run()
}
