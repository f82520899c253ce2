//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one spinner line per in-flight target plus an overall bar.
//! Non-TTY mode: hidden bars; the logs carry the progress.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Width the target label is truncated to so lines stay aligned
const LABEL_WIDTH: usize = 28;

fn target_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:<28.dim} {wide_msg:.dim}")
        .expect("invalid template")
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:<10.cyan.bold} [{elapsed_precise}] {bar:30.green/dim} {pos}/{len} {wide_msg}",
    )
    .expect("invalid template")
    .progress_chars("━━ ")
}

/// Central progress context managing the multi-progress display.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY on stderr.
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: std::io::stderr().is_terminal(),
        }
    }

    /// Context that never draws (tests, piped output)
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: false,
        }
    }

    /// Spinner line for one target; hidden outside a TTY.
    ///
    /// Update with `pb.set_message(...)`, remove with `finish_and_clear()`.
    pub fn target_line(&self, label: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(target_style());
        pb.set_prefix(truncate_label(label));
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Overall "targets done" bar; hidden outside a TTY.
    pub fn overall_bar(&self, total: usize) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(total as u64));
        pb.set_style(overall_style());
        pb.set_prefix("targets");
        pb
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for the log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Cut `label` to [`LABEL_WIDTH`] chars, marking the cut with `…`
fn truncate_label(label: &str) -> String {
    if label.chars().count() <= LABEL_WIDTH {
        return label.to_string();
    }
    let mut out: String = label.chars().take(LABEL_WIDTH - 1).collect();
    out.push('…');
    out
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
