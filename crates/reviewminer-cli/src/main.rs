//! reviewminer - harvest pull-request review comments from GitHub
//!
//! Walks the review comments of each configured repository and writes them
//! as prompt-ready JSON shards.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reviewminer_core::{ProgressContext, SharedProgress, Verbosity, init_logging};

mod cmd;
mod config;

use config::Config;

/// Exit status for configuration and other fatal errors
const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(name = "reviewminer")]
#[command(about = "Harvest pull-request review comments from GitHub")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./reviewminer.toml or ~/.config/reviewminer/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch review comments for every target and write shards
    Harvest(cmd::harvest::HarvestArgs),
    /// Show the remaining API request budget
    Rate,
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(ProgressContext::new());

    // Logging:
    //   TTY:     warn unless --debug (progress bars show activity)
    //   non-TTY: info unless --debug
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = is_tty && !cli.debug;
    if let Err(e) = init_logging(Verbosity::from_flags(quiet, cli.debug), multi) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match dispatch(cli, &progress) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn dispatch(cli: Cli, progress: &SharedProgress) -> Result<ExitCode> {
    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Harvest(args) => cmd::harvest::run(args, &config, progress),
        Command::Rate => cmd::rate::run(&config),
        Command::Config => {
            show_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn show_config(config: &Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["API URL", &config.github.api_url]);
    table.add_row(vec![
        "GitHub token",
        if config.token().is_some() {
            "configured"
        } else {
            "not set"
        },
    ]);
    table.add_row(vec!["User agent", &config.github.user_agent]);
    table.add_row(vec![
        "Request timeout",
        &format!("{}s", config.github.timeout_secs),
    ]);
    table.add_row(vec!["Page size", &config.github.per_page.to_string()]);
    table.add_row(vec!["Workers", &config.workers.max.to_string()]);
    table.add_row(vec![
        "Output directory",
        &config.output.dir.display().to_string(),
    ]);
    table.add_row(vec![
        "Empty shards",
        if config.output.write_empty_shards {
            "written"
        } else {
            "skipped"
        },
    ]);
    table.add_row(vec![
        "Rate limit",
        &format!(
            "{} (poll {}s, margin {}s)",
            if config.rate.enforce {
                "enforced"
            } else {
                "advisory"
            },
            config.rate.poll_interval_secs,
            config.rate.margin_secs
        ),
    ]);
    table.add_row(vec![
        "Retry backoff",
        &format!("{}s", config.retry.backoff_secs),
    ]);
    let targets = if config.targets.is_empty() {
        "none".to_string()
    } else {
        config
            .targets
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    };
    table.add_row(vec!["Targets", &targets]);

    eprintln!("\n{table}");
}
