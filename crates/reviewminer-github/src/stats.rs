//! Per-target statistics and the run summary.
//!
//! Statistics hierarchy:
//! - Target-level: `TargetStats`, one per dequeued target
//! - Run-level: `RunSummary`, aggregated once the workers have exited

use std::path::PathBuf;
use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use reviewminer_core::progress::fmt_num;

use crate::target::Target;

/// How processing of one target ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
    /// All pages fetched and the shard handled
    Completed,
    /// Cancelled mid-fetch; the comments gathered so far were written
    Partial,
    /// Cancelled before any comment arrived; nothing written
    Interrupted,
    /// The shard could not be written
    Failed,
}

impl std::fmt::Display for TargetOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        })
    }
}

/// Statistics for one target.
#[derive(Debug, Clone)]
pub struct TargetStats {
    pub target: Target,
    /// Non-empty pages received
    pub pages: usize,
    /// Failed requests that were retried
    pub retries: usize,
    pub comments: usize,
    pub outcome: TargetOutcome,
    /// Shard written for this target, if any
    pub shard: Option<PathBuf>,
    pub elapsed: Duration,
}

impl TargetStats {
    /// Log target completion (non-TTY mode only).
    pub fn log(&self) {
        let shard = self
            .shard
            .as_deref()
            .map_or_else(|| "no shard".to_string(), |p| p.display().to_string());
        log::info!(
            "{}: {} comments over {} pages, {} ({shard}) [{:.1}s]",
            self.target,
            fmt_num(self.comments),
            self.pages,
            self.outcome,
            self.elapsed.as_secs_f64()
        );
    }
}

/// Aggregated result of one harvest run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub total_targets: usize,
    pub completed: usize,
    pub partial: usize,
    pub interrupted: usize,
    pub failed: usize,
    pub comments: usize,
    pub retries: usize,
    pub shards_written: usize,
    pub elapsed: Duration,
    /// Cancellation was requested before the queue drained
    pub was_interrupted: bool,
    pub targets: Vec<TargetStats>,
}

impl RunSummary {
    /// Aggregate from per-target stats; `total` counts every queued target.
    pub fn from_targets(
        targets: Vec<TargetStats>,
        total: usize,
        elapsed: Duration,
        was_interrupted: bool,
    ) -> Self {
        let mut summary = Self {
            total_targets: total,
            elapsed,
            was_interrupted,
            ..Default::default()
        };
        for t in &targets {
            match t.outcome {
                TargetOutcome::Completed => summary.completed += 1,
                TargetOutcome::Partial => summary.partial += 1,
                TargetOutcome::Interrupted => summary.interrupted += 1,
                TargetOutcome::Failed => summary.failed += 1,
            }
            summary.comments += t.comments;
            summary.retries += t.retries;
            summary.shards_written += usize::from(t.shard.is_some());
        }
        summary.targets = targets;
        summary
    }

    /// Summary for a run with nothing queued
    pub fn empty() -> Self {
        Self::default()
    }

    /// Queued targets no worker picked up
    pub fn not_processed(&self) -> usize {
        self.total_targets.saturating_sub(self.targets.len())
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Harvest")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("Targets"),
            Cell::new(format!("{}/{} completed", self.completed, self.total_targets)),
        ]);
        if self.partial > 0 {
            table.add_row(vec![
                Cell::new("Partial").fg(Color::Yellow),
                Cell::new(self.partial).fg(Color::Yellow),
            ]);
        }
        if self.failed > 0 {
            table.add_row(vec![
                Cell::new("Failed").fg(Color::Red),
                Cell::new(self.failed).fg(Color::Red),
            ]);
        }
        let skipped = self.interrupted + self.not_processed();
        if skipped > 0 {
            table.add_row(vec![Cell::new("Not processed"), Cell::new(skipped)]);
        }
        table.add_row(vec![
            Cell::new("Comments").fg(Color::Green),
            Cell::new(fmt_num(self.comments)).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Shards written"),
            Cell::new(self.shards_written),
        ]);
        if self.retries > 0 {
            table.add_row(vec![Cell::new("Retries"), Cell::new(self.retries)]);
        }
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
        ]);

        let status = if self.was_interrupted { "\nInterrupted" } else { "" };
        format!("\n{table}{status}")
    }

    /// Print summary table (TTY mode).
    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "Harvest {}: {}/{} targets completed, {} partial, {} failed, {} not processed; \
             {} comments in {} shards [{:.1}s]",
            if self.was_interrupted {
                "interrupted"
            } else {
                "complete"
            },
            self.completed,
            self.total_targets,
            self.partial,
            self.failed,
            self.interrupted + self.not_processed(),
            fmt_num(self.comments),
            self.shards_written,
            self.elapsed.as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(name: &str, comments: usize, outcome: TargetOutcome, shard: bool) -> TargetStats {
        TargetStats {
            target: Target::new("o", name),
            pages: comments.div_ceil(30),
            retries: 1,
            comments,
            outcome,
            shard: shard.then(|| PathBuf::from(format!("o_{name}_1.json"))),
            elapsed: Duration::from_millis(10),
        }
    }

    #[test]
    fn aggregates_outcomes() {
        let summary = RunSummary::from_targets(
            vec![
                stats("a", 40, TargetOutcome::Completed, true),
                stats("b", 0, TargetOutcome::Completed, true),
                stats("c", 5, TargetOutcome::Partial, true),
                stats("d", 0, TargetOutcome::Interrupted, false),
                stats("e", 7, TargetOutcome::Failed, false),
            ],
            7,
            Duration::from_secs(3),
            true,
        );

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.partial, 1);
        assert_eq!(summary.interrupted, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.comments, 52);
        assert_eq!(summary.retries, 5);
        assert_eq!(summary.shards_written, 3);
        assert_eq!(summary.not_processed(), 2);
    }

    #[test]
    fn empty_summary() {
        let summary = RunSummary::empty();
        assert_eq!(summary.total_targets, 0);
        assert_eq!(summary.not_processed(), 0);
        assert!(!summary.was_interrupted);
    }

    #[test]
    fn table_mentions_interruption_only_when_interrupted() {
        let done = RunSummary::from_targets(
            vec![stats("a", 3, TargetOutcome::Completed, true)],
            1,
            Duration::ZERO,
            false,
        );
        assert!(done.format_table().contains("1/1 completed"));
        assert!(!done.format_table().contains("Interrupted"));

        let cut = RunSummary::from_targets(vec![], 4, Duration::ZERO, true);
        let table = cut.format_table();
        assert!(table.contains("Not processed"));
        assert!(table.ends_with("Interrupted"));
    }

    #[test]
    fn outcome_display() {
        assert_eq!(TargetOutcome::Partial.to_string(), "partial");
        assert_eq!(TargetOutcome::Failed.to_string(), "failed");
    }
}
