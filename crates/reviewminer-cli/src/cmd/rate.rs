//! Rate subcommand - show the remaining API budget

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use reviewminer_github::{GitHubClient, ReviewApi};

use crate::config::Config;

pub fn run(config: &Config) -> Result<ExitCode> {
    let harvest = config.harvest_config();
    let client = GitHubClient::new(&harvest.api_url, harvest.per_page, &harvest.http())
        .context("Failed to build GitHub client")?;
    let state = client
        .rate_limit()
        .with_context(|| format!("Failed to query {}/rate_limit", harvest.api_url))?;

    let resets_in = (state.reset_at - Utc::now()).num_seconds().max(0);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Rate limit").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    let remaining = Cell::new(state.remaining);
    table.add_row(vec![
        Cell::new("Remaining"),
        if state.is_exhausted() {
            remaining.fg(Color::Red)
        } else {
            remaining.fg(Color::Green)
        },
    ]);
    table.add_row(vec![
        Cell::new("Resets at"),
        Cell::new(state.reset_at.format("%Y-%m-%d %H:%M:%S UTC")),
    ]);
    table.add_row(vec![
        Cell::new("Resets in"),
        Cell::new(format!("{resets_in}s")),
    ]);
    table.add_row(vec![
        Cell::new("Token"),
        Cell::new(if harvest.token.is_some() {
            "configured"
        } else {
            "not set"
        }),
    ]);

    eprintln!("\n{table}");
    Ok(ExitCode::SUCCESS)
}
