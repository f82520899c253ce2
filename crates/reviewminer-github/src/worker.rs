//! Worker pool: drain the target queue through fetch, build and write

use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use indicatif::ProgressBar;
use reviewminer_core::progress::{SharedProgress, fmt_num};
use reviewminer_core::{Clock, WorkQueue, is_cancelled};

use crate::api::ReviewApi;
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::rate::RateLedger;
use crate::record::build_records;
use crate::shard::ShardWriter;
use crate::stats::{TargetOutcome, TargetStats};
use crate::target::Target;

/// Everything a worker needs, shared read-only across the pool
pub struct WorkerContext<'a> {
    pub api: &'a dyn ReviewApi,
    pub clock: &'a dyn Clock,
    pub ledger: &'a RateLedger,
    pub writer: &'a ShardWriter,
    pub config: &'a Config,
}

/// Run `workers` workers until the queue is drained or `cancel` is set.
///
/// Each worker checks the flag before claiming a target, then processes
/// the claimed target to the end. Returns stats for every claimed target.
pub fn process_targets(
    queue: &WorkQueue<Target>,
    ctx: &WorkerContext<'_>,
    workers: usize,
    progress: &SharedProgress,
    cancel: &AtomicBool,
) -> Vec<TargetStats> {
    let results: Mutex<Vec<TargetStats>> = Mutex::new(Vec::with_capacity(queue.total()));
    let overall = progress.overall_bar(queue.total());
    let is_tty = progress.is_tty();

    rayon::scope(|s| {
        for _ in 0..workers {
            s.spawn(|_| {
                loop {
                    if is_cancelled(cancel) {
                        break;
                    }
                    let Some(target) = queue.next() else {
                        break;
                    };

                    let pb = progress.target_line(&target.to_string());
                    pb.set_message("starting...");
                    let stats = process_target(target, ctx, &pb, cancel);
                    pb.finish_and_clear();
                    overall.inc(1);
                    if !is_tty {
                        stats.log();
                    }
                    results
                        .lock()
                        .expect("worker thread panicked")
                        .push(stats);
                }
            });
        }
    });

    overall.finish_and_clear();
    results.into_inner().expect("worker thread panicked")
}

/// Fetch every page of `target`, build its records and write its shard.
///
/// Never fails: a write error is logged and reported as
/// [`TargetOutcome::Failed`].
pub fn process_target(
    target: &Target,
    ctx: &WorkerContext<'_>,
    pb: &ProgressBar,
    cancel: &AtomicBool,
) -> TargetStats {
    let started = Instant::now();
    log::info!("{target}: fetching review comments");

    let mut fetcher = Fetcher::new(ctx.api, ctx.clock).with_backoff(ctx.config.backoff);
    if ctx.config.enforce_rate_limit {
        fetcher = fetcher.with_gate(ctx.ledger, ctx.config.rate_margin);
    }
    let fetched = fetcher.fetch_all(target, cancel, pb);

    let mut stats = TargetStats {
        target: target.clone(),
        pages: fetched.pages,
        retries: fetched.retries,
        comments: fetched.comments.len(),
        outcome: TargetOutcome::Completed,
        shard: None,
        elapsed: started.elapsed(),
    };

    if fetched.comments.is_empty() {
        if fetched.cancelled {
            stats.outcome = TargetOutcome::Interrupted;
            return stats;
        }
        if !ctx.config.write_empty_shards {
            log::info!("{target}: no review comments, skipping empty shard");
            return stats;
        }
    }

    pb.set_message(format!("writing {} records", fmt_num(fetched.comments.len())));
    let records = build_records(target, &fetched.comments, &mut rand::thread_rng());
    match ctx.writer.write(target, &records) {
        Ok(path) => {
            log::info!(
                "{target}: wrote {} records to {}",
                records.len(),
                path.display()
            );
            stats.shard = Some(path);
            if fetched.cancelled {
                stats.outcome = TargetOutcome::Partial;
            }
        }
        Err(e) => {
            if e.is_storage_full() {
                log::error!("{target}: output disk is full, shard not written: {e}");
            } else {
                log::error!("{target}: failed to write shard: {e}");
            }
            stats.outcome = TargetOutcome::Failed;
        }
    }

    stats.elapsed = started.elapsed();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedApi;
    use chrono::{DateTime, Utc};
    use reviewminer_core::{ManualClock, ProgressContext};
    use std::sync::Arc;

    struct Harness {
        api: Arc<ScriptedApi>,
        clock: Arc<ManualClock>,
        ledger: RateLedger,
        writer: ShardWriter,
        config: Config,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(api: ScriptedApi, config: Config) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let api = Arc::new(api);
            let clock = Arc::new(ManualClock::new(
                DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            ));
            Self {
                ledger: RateLedger::new(api.clone(), clock.clone()),
                writer: ShardWriter::new(dir.path()),
                api,
                clock,
                config,
                _dir: dir,
            }
        }

        fn ctx(&self) -> WorkerContext<'_> {
            WorkerContext {
                api: self.api.as_ref(),
                clock: self.clock.as_ref(),
                ledger: &self.ledger,
                writer: &self.writer,
                config: &self.config,
            }
        }

        fn shard_count(&self) -> usize {
            std::fs::read_dir(self.writer.dir()).unwrap().count()
        }
    }

    fn t(name: &str) -> Target {
        Target::new("octo", name)
    }

    #[test]
    fn target_with_comments_is_written() {
        let h = Harness::new(ScriptedApi::new().with_pages(t("a"), vec![2, 1]), Config::default());
        let flag = AtomicBool::new(false);

        let stats = process_target(&t("a"), &h.ctx(), &ProgressBar::hidden(), &flag);

        assert_eq!(stats.outcome, TargetOutcome::Completed);
        assert_eq!(stats.comments, 3);
        assert_eq!(stats.pages, 2);
        let shard = stats.shard.unwrap();
        assert!(shard.ends_with("octo_a_1.json"));
        let records: Vec<crate::record::HarvestRecord> =
            serde_json::from_str(&std::fs::read_to_string(shard).unwrap()).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.project_name == "octo/a"));
    }

    #[test]
    fn empty_target_writes_marker_by_default() {
        let h = Harness::new(ScriptedApi::new(), Config::default());
        let flag = AtomicBool::new(false);

        let stats = process_target(&t("a"), &h.ctx(), &ProgressBar::hidden(), &flag);
        assert_eq!(stats.outcome, TargetOutcome::Completed);
        assert_eq!(
            std::fs::read_to_string(stats.shard.unwrap()).unwrap(),
            "[]"
        );
    }

    #[test]
    fn empty_target_skipped_when_configured() {
        let config = Config {
            write_empty_shards: false,
            ..Config::default()
        };
        let h = Harness::new(ScriptedApi::new(), config);
        let flag = AtomicBool::new(false);

        let stats = process_target(&t("a"), &h.ctx(), &ProgressBar::hidden(), &flag);
        assert_eq!(stats.outcome, TargetOutcome::Completed);
        assert!(stats.shard.is_none());
        assert_eq!(h.shard_count(), 0);
    }

    #[test]
    fn cancelled_mid_fetch_writes_partial_shard() {
        let flag = Arc::new(AtomicBool::new(false));
        let api = ScriptedApi::new()
            .with_pages(t("a"), vec![2, 2, 2])
            .cancel_after_pages(1, flag.clone());
        let h = Harness::new(api, Config::default());

        let stats = process_target(&t("a"), &h.ctx(), &ProgressBar::hidden(), &flag);
        assert_eq!(stats.outcome, TargetOutcome::Partial);
        assert_eq!(stats.comments, 2);
        assert!(stats.shard.is_some());
    }

    #[test]
    fn cancelled_before_any_comment_writes_nothing() {
        let h = Harness::new(ScriptedApi::new().with_pages(t("a"), vec![5]), Config::default());
        let flag = AtomicBool::new(true);

        let stats = process_target(&t("a"), &h.ctx(), &ProgressBar::hidden(), &flag);
        assert_eq!(stats.outcome, TargetOutcome::Interrupted);
        assert_eq!(h.shard_count(), 0);
        assert!(h.api.calls().is_empty());
    }

    #[test]
    fn unwritable_output_counts_as_failed() {
        let h = Harness::new(ScriptedApi::new().with_pages(t("a"), vec![1]), Config::default());
        // A regular file where the output directory should be
        let blocked = h.writer.dir().join("blocked");
        std::fs::write(&blocked, "").unwrap();
        let writer = ShardWriter::new(&blocked);
        let ctx = WorkerContext {
            writer: &writer,
            ..h.ctx()
        };
        let flag = AtomicBool::new(false);

        let stats = process_target(&t("a"), &ctx, &ProgressBar::hidden(), &flag);
        assert_eq!(stats.outcome, TargetOutcome::Failed);
        assert!(stats.shard.is_none());
    }

    #[test]
    fn pool_claims_each_target_once() {
        let targets: Vec<Target> = (0..12).map(|i| t(&format!("r{i}"))).collect();
        let api = targets
            .iter()
            .fold(ScriptedApi::new(), |api, target| {
                api.with_pages(target.clone(), vec![1])
            });
        let h = Harness::new(api, Config::default());
        let queue = WorkQueue::new(targets.clone());
        let progress = Arc::new(ProgressContext::hidden());
        let flag = AtomicBool::new(false);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();
        let stats = pool.install(|| process_targets(&queue, &h.ctx(), 4, &progress, &flag));

        assert_eq!(stats.len(), 12);
        for target in &targets {
            assert_eq!(h.api.pages_requested(target), vec![1, 2]);
        }
        assert_eq!(h.shard_count(), 12);
    }

    #[test]
    fn cancelled_pool_claims_nothing() {
        let h = Harness::new(ScriptedApi::new(), Config::default());
        let queue = WorkQueue::new(vec![t("a"), t("b")]);
        let progress = Arc::new(ProgressContext::hidden());
        let flag = AtomicBool::new(true);

        let stats = process_targets(&queue, &h.ctx(), 2, &progress, &flag);
        assert!(stats.is_empty());
        assert_eq!(queue.remaining(), 2);
    }
}
