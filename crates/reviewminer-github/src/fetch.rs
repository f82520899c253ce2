//! Paginated fetch of one target's review comments.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use indicatif::ProgressBar;
use reviewminer_core::progress::fmt_num;
use reviewminer_core::{Clock, is_cancelled};

use crate::api::{RawComment, ReviewApi};
use crate::rate::RateLedger;
use crate::target::Target;

/// Pause before retrying a failed page
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Everything collected for one target
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub comments: Vec<RawComment>,
    /// Non-empty pages received
    pub pages: usize,
    /// Requests issued, retries included
    pub pages_requested: usize,
    pub retries: usize,
    /// Stopped by cancellation before the empty terminating page
    pub cancelled: bool,
}

/// Walks the comment listing of a target until an empty page.
pub struct Fetcher<'a> {
    api: &'a dyn ReviewApi,
    clock: &'a dyn Clock,
    gate: Option<&'a RateLedger>,
    margin: Duration,
    backoff: Duration,
}

impl<'a> Fetcher<'a> {
    pub fn new(api: &'a dyn ReviewApi, clock: &'a dyn Clock) -> Self {
        Self {
            api,
            clock,
            gate: None,
            margin: Duration::from_secs(1),
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Hold each request while `ledger` shows a spent budget
    pub fn with_gate(mut self, ledger: &'a RateLedger, margin: Duration) -> Self {
        self.gate = Some(ledger);
        self.margin = margin;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Fetch pages 1, 2, ... until one comes back empty.
    ///
    /// A failed request is retried on the same page after the backoff, with
    /// no ceiling; only cancellation ends the loop early, in which case the
    /// comments gathered so far are returned with `cancelled` set.
    pub fn fetch_all(
        &self,
        target: &Target,
        cancel: &AtomicBool,
        pb: &ProgressBar,
    ) -> FetchOutcome {
        let mut out = FetchOutcome::default();
        let mut page: u32 = 1;

        loop {
            if is_cancelled(cancel) {
                out.cancelled = true;
                break;
            }

            if let Some(gate) = self.gate {
                if gate.exhausted_until().is_some() {
                    pb.set_message("waiting for rate limit");
                }
                if !gate.wait_for_budget(self.margin, cancel) {
                    out.cancelled = true;
                    break;
                }
            }

            pb.set_message(format!("page {page}, {} comments", fmt_num(out.comments.len())));
            out.pages_requested += 1;

            match self.api.comments_page(target, page) {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => {
                    log::debug!("{target}: page {page}, {} comments", batch.len());
                    out.comments.extend(batch);
                    out.pages += 1;
                    page += 1;
                }
                Err(e) => {
                    out.retries += 1;
                    let reason = if e.is_rate_limited() {
                        "rate limited"
                    } else {
                        "failed"
                    };
                    log::warn!(
                        "{target}: page {page} {reason}, retrying in {}s: {e}",
                        self.backoff.as_secs()
                    );
                    pb.set_message(format!("retrying page {page}"));
                    if !self.clock.sleep(self.backoff, cancel) {
                        out.cancelled = true;
                        break;
                    }
                }
            }
        }

        if out.cancelled {
            log::info!(
                "{target}: interrupted at page {page} with {} comments",
                out.comments.len()
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RateState;
    use crate::test_support::{ScriptedApi, scripted_comment};
    use chrono::{DateTime, Utc};
    use reviewminer_core::http::HttpError;
    use reviewminer_core::{ManualClock, request_cancel};
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn target() -> Target {
        Target::new("octo", "widgets")
    }

    #[test]
    fn stops_at_first_empty_page() {
        let api = ScriptedApi::new().with_pages(target(), vec![3, 2, 0]);
        let clock = ManualClock::new(start());
        let flag = AtomicBool::new(false);

        let out = Fetcher::new(&api, &clock).fetch_all(&target(), &flag, &ProgressBar::hidden());

        assert_eq!(out.comments.len(), 5);
        assert_eq!(out.pages, 2);
        assert_eq!(out.pages_requested, 3);
        assert!(!out.cancelled);
        assert_eq!(api.pages_requested(&target()), vec![1, 2, 3]);
        assert_eq!(out.comments[3], scripted_comment(&target(), 2, 0));
    }

    #[test]
    fn empty_first_page_yields_nothing() {
        let api = ScriptedApi::new();
        let clock = ManualClock::new(start());
        let flag = AtomicBool::new(false);

        let out = Fetcher::new(&api, &clock).fetch_all(&target(), &flag, &ProgressBar::hidden());
        assert!(out.comments.is_empty());
        assert_eq!(out.pages_requested, 1);
    }

    #[test]
    fn retries_same_page_after_backoff() {
        let api = ScriptedApi::new()
            .with_pages(target(), vec![4])
            .failing(target(), 1, 2);
        let clock = ManualClock::new(start());
        let flag = AtomicBool::new(false);

        let out = Fetcher::new(&api, &clock).fetch_all(&target(), &flag, &ProgressBar::hidden());

        assert_eq!(out.comments.len(), 4);
        assert_eq!(out.retries, 2);
        assert_eq!(api.pages_requested(&target()), vec![1, 1, 1, 2]);
        assert_eq!(clock.sleeps(), vec![DEFAULT_BACKOFF, DEFAULT_BACKOFF]);
    }

    #[test]
    fn retry_later_page_keeps_earlier_data_once() {
        let api = ScriptedApi::new()
            .with_pages(target(), vec![2, 3])
            .failing(target(), 2, 1);
        let clock = ManualClock::new(start());
        let flag = AtomicBool::new(false);

        let out = Fetcher::new(&api, &clock)
            .with_backoff(Duration::from_secs(2))
            .fetch_all(&target(), &flag, &ProgressBar::hidden());

        assert_eq!(out.comments.len(), 5);
        assert_eq!(api.pages_requested(&target()), vec![1, 2, 2, 3]);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn cancel_after_first_page_returns_partial() {
        let flag = Arc::new(AtomicBool::new(false));
        let api = ScriptedApi::new()
            .with_pages(target(), vec![3, 3, 3])
            .cancel_after_pages(1, flag.clone());
        let clock = ManualClock::new(start());

        let out = Fetcher::new(&api, &clock).fetch_all(&target(), &flag, &ProgressBar::hidden());

        assert!(out.cancelled);
        assert_eq!(out.comments.len(), 3);
        assert!(out.comments.iter().all(|c| c.body.starts_with("comment 1.")));
        assert_eq!(api.pages_requested(&target()), vec![1]);
    }

    #[test]
    fn already_cancelled_makes_no_requests() {
        let api = ScriptedApi::new().failing(target(), 1, 100);
        let clock = ManualClock::new(start());
        let flag = AtomicBool::new(false);
        request_cancel(&flag);

        let out = Fetcher::new(&api, &clock).fetch_all(&target(), &flag, &ProgressBar::hidden());
        assert!(out.cancelled);
        assert!(api.calls().is_empty());
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn gate_holds_request_until_reset() {
        let api = Arc::new(
            ScriptedApi::new()
                .with_rate(vec![Ok(RateState {
                    remaining: 0,
                    reset_at: start() + chrono::Duration::seconds(20),
                })])
                .with_pages(target(), vec![1]),
        );
        let clock = Arc::new(ManualClock::new(start()));
        let ledger = RateLedger::new(api.clone(), clock.clone());
        ledger.poll();
        let flag = AtomicBool::new(false);

        let out = Fetcher::new(api.as_ref(), clock.as_ref())
            .with_gate(&ledger, Duration::from_secs(1))
            .fetch_all(&target(), &flag, &ProgressBar::hidden());

        assert_eq!(out.comments.len(), 1);
        // Single hold; the stale snapshot no longer blocks once reset passed
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(21)]);
    }

    #[test]
    fn gate_ignores_fallback_from_failed_rate_query() {
        let api = Arc::new(
            ScriptedApi::new()
                .with_rate(vec![Err(HttpError::Http {
                    status: Some(404),
                    message: "rate limiting disabled".into(),
                })])
                .with_pages(target(), vec![1]),
        );
        let clock = Arc::new(ManualClock::new(start()));
        let ledger = RateLedger::new(api.clone(), clock.clone());
        ledger.poll();
        let flag = AtomicBool::new(false);

        let out = Fetcher::new(api.as_ref(), clock.as_ref())
            .with_gate(&ledger, Duration::from_secs(1))
            .fetch_all(&target(), &flag, &ProgressBar::hidden());

        assert_eq!(out.comments.len(), 1);
        assert!(clock.sleeps().is_empty());
    }
}
