//! Main execution logic for a harvest run

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use anyhow::Context;
use reviewminer_core::{
    Clock, SharedProgress, SystemClock, WorkQueue, is_cancelled, request_cancel,
};

use crate::api::{GitHubClient, ReviewApi};
use crate::config::Config;
use crate::rate::{RateGuard, RateLedger};
use crate::shard::{ShardWriter, cleanup_tmp_files};
use crate::stats::RunSummary;
use crate::worker::{self, WorkerContext};

/// Harvest every configured target against the GitHub API.
pub fn run(
    config: &Config,
    progress: &SharedProgress,
    cancel: &AtomicBool,
) -> anyhow::Result<RunSummary> {
    let api = GitHubClient::new(&config.api_url, config.per_page, &config.http())
        .context("Failed to build GitHub client")?;
    run_with(Arc::new(api), Arc::new(SystemClock), config, progress, cancel)
}

/// Harvest with an explicit API and clock.
///
/// The rate guard runs on its own thread for the whole run; the worker pool
/// drains the queue. Once every worker has exited the cancellation flag is
/// set to stop the guard, so `cancel` is always set when this returns.
/// Whether the run was interrupted is captured before that, in
/// [`RunSummary::was_interrupted`].
pub fn run_with(
    api: Arc<dyn ReviewApi>,
    clock: Arc<dyn Clock>,
    config: &Config,
    progress: &SharedProgress,
    cancel: &AtomicBool,
) -> anyhow::Result<RunSummary> {
    config.validate()?;
    let started = Instant::now();

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Cannot create output directory {}",
            config.output_dir.display()
        )
    })?;
    let stale = cleanup_tmp_files(&config.output_dir);
    if stale > 0 {
        log::info!("Removed {stale} stale tmp files");
    }

    let total = config.targets.len();
    if total == 0 {
        log::info!("No targets configured, nothing to do");
        return Ok(RunSummary::empty());
    }
    let workers = config.workers.min(total);
    log::info!(
        "reviewminer starting: {total} targets, {workers} workers, output={}, rate enforcement {}",
        config.output_dir.display(),
        if config.enforce_rate_limit { "on" } else { "off" }
    );

    let queue = WorkQueue::new(config.targets.clone());
    let ledger = RateLedger::new(api.clone(), clock.clone());
    let writer = ShardWriter::new(&config.output_dir);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("worker-{i}"))
        .build()
        .context("Failed to create thread pool")?;

    let (targets, interrupted) = std::thread::scope(|s| -> anyhow::Result<_> {
        let guard = RateGuard::new(&ledger, config.poll_interval, config.rate_margin);
        let guard_handle = std::thread::Builder::new()
            .name("rate-guard".into())
            .spawn_scoped(s, move || guard.run(cancel))
            .context("Failed to spawn rate guard")?;

        let ctx = WorkerContext {
            api: api.as_ref(),
            clock: clock.as_ref(),
            ledger: &ledger,
            writer: &writer,
            config,
        };
        let targets =
            pool.install(|| worker::process_targets(&queue, &ctx, workers, progress, cancel));

        let interrupted = is_cancelled(cancel);
        if interrupted {
            log::warn!(
                "Interrupted with {} targets not started",
                queue.remaining()
            );
        }
        request_cancel(cancel);
        match guard_handle.join() {
            Ok(stats) => log::debug!("Rate guard: {} polls, {} waits", stats.polls, stats.waits),
            Err(_) => log::error!("Rate guard thread panicked"),
        }
        Ok((targets, interrupted))
    })?;

    let summary = RunSummary::from_targets(targets, total, started.elapsed(), interrupted);
    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }
    Ok(summary)
}
