//! Harvest subcommand - fetch review comments for every target

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use reviewminer_core::{SharedProgress, install_signal_handlers, shutdown_flag};
use reviewminer_github::{RunSummary, Target};

use crate::config::Config;

#[derive(Args, Debug, Default)]
pub struct HarvestArgs {
    /// Repository as owner/name; repeatable, replaces the configured targets
    #[arg(short, long = "target", value_name = "OWNER/NAME")]
    pub targets: Vec<Target>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Don't write shards for repositories without review comments
    #[arg(long)]
    pub skip_empty: bool,

    /// Keep requesting while the rate budget is spent (advisory guard only)
    #[arg(long)]
    pub no_enforce: bool,
}

/// File configuration with the command-line overrides applied
pub fn resolve(args: HarvestArgs, config: &Config) -> reviewminer_github::Config {
    let mut harvest = config.harvest_config();
    if !args.targets.is_empty() {
        harvest.targets = args.targets;
    }
    if let Some(workers) = args.workers {
        harvest.workers = workers;
    }
    if let Some(output) = args.output {
        harvest.output_dir = output;
    }
    if args.skip_empty {
        harvest.write_empty_shards = false;
    }
    if args.no_enforce {
        harvest.enforce_rate_limit = false;
    }
    harvest
}

pub fn run(args: HarvestArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let harvest = resolve(args, config);
    harvest.validate().context("Invalid configuration")?;

    if harvest.targets.is_empty() {
        log::warn!("No targets configured; add [[targets]] to the config or pass --target");
    }
    if harvest.token.is_none() {
        log::warn!("No GitHub token configured, requests are unauthenticated");
    }

    install_signal_handlers().context("Failed to install signal handlers")?;
    let summary = reviewminer_github::run(&harvest, progress, shutdown_flag())?;
    Ok(ExitCode::from(exit_status(&summary)))
}

/// A drained interrupt is a clean stop, not a failure
fn exit_status(summary: &RunSummary) -> u8 {
    if summary.was_interrupted {
        log::warn!("Harvest interrupted");
    }
    0
}
