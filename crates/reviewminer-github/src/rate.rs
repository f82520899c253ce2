//! Rate budget tracking: the ledger (last observed budget) and the guard
//! (background loop that keeps the ledger fresh and backs off while the
//! budget is spent).

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reviewminer_core::{Clock, is_cancelled, later_by};

use crate::api::{RateState, ReviewApi};

/// Reset horizon assumed when the rate-status query itself fails
pub const UNKNOWN_RESET_HORIZON: Duration = Duration::from_secs(60);

/// One stored poll result
#[derive(Debug, Clone, Copy)]
struct Observation {
    state: RateState,
    /// Fallback recorded for a failed query, not a budget GitHub reported
    assumed: bool,
}

/// Last observed request budget.
///
/// The snapshot is a single value replaced as a whole on every poll, so
/// readers never see `remaining` from one poll paired with `reset_at` from
/// another.
pub struct RateLedger {
    api: Arc<dyn ReviewApi>,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<Observation>>,
}

impl RateLedger {
    pub fn new(api: Arc<dyn ReviewApi>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            clock,
            state: Mutex::new(None),
        }
    }

    /// Query the rate-status endpoint and store the result.
    ///
    /// A failed query is not propagated: it is recorded as an exhausted
    /// budget resetting in [`UNKNOWN_RESET_HORIZON`]. That fallback only
    /// paces the guard's own polling; the request gate ignores it.
    pub fn poll(&self) -> RateState {
        let observation = match self.api.rate_limit() {
            Ok(state) => Observation {
                state,
                assumed: false,
            },
            Err(e) => {
                log::warn!("Failed to query rate limit: {e}");
                Observation {
                    state: RateState {
                        remaining: 0,
                        reset_at: later_by(self.clock.now(), UNKNOWN_RESET_HORIZON),
                    },
                    assumed: true,
                }
            }
        };
        let state = observation.state;
        log::debug!(
            "Rate budget: {} remaining, resets at {}",
            state.remaining,
            state.reset_at
        );
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = Some(observation);
        state
    }

    fn observation(&self) -> Option<Observation> {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Most recent poll result, if any
    pub fn snapshot(&self) -> Option<RateState> {
        self.observation().map(|o| o.state)
    }

    /// Reset instant of the snapshot, if GitHub reported the budget spent
    /// and it has not reset yet. An assumed fallback never counts.
    pub fn exhausted_until(&self) -> Option<DateTime<Utc>> {
        let observed = self.observation().filter(|o| !o.assumed)?;
        let state = observed.state;
        (state.is_exhausted() && state.reset_at > self.clock.now()).then_some(state.reset_at)
    }

    /// Block a request while the last snapshot shows a spent budget.
    ///
    /// Returns `false` if cancellation cut the wait short.
    pub fn wait_for_budget(&self, margin: Duration, cancel: &AtomicBool) -> bool {
        let Some(reset_at) = self.exhausted_until() else {
            return !is_cancelled(cancel);
        };
        log::info!("Rate limit exhausted, holding requests until {reset_at}");
        self.clock.sleep_until(later_by(reset_at, margin), cancel)
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

/// Counters reported when the guard exits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GuardStats {
    pub polls: usize,
    pub waits: usize,
}

/// Background loop polling the ledger for the lifetime of a run.
pub struct RateGuard<'a> {
    ledger: &'a RateLedger,
    poll_interval: Duration,
    margin: Duration,
}

impl<'a> RateGuard<'a> {
    pub fn new(ledger: &'a RateLedger, poll_interval: Duration, margin: Duration) -> Self {
        Self {
            ledger,
            poll_interval,
            margin,
        }
    }

    /// Poll until `cancel` is set.
    ///
    /// On an exhausted budget, sleep until the reset instant plus the margin
    /// before polling again; otherwise sleep the poll interval.
    pub fn run(&self, cancel: &AtomicBool) -> GuardStats {
        let clock = self.ledger.clock();
        let mut stats = GuardStats::default();

        while !is_cancelled(cancel) {
            let state = self.ledger.poll();
            stats.polls += 1;

            let wait = (state.reset_at - clock.now()).to_std().ok();
            let slept = match wait {
                Some(wait) if state.is_exhausted() && !wait.is_zero() => {
                    stats.waits += 1;
                    log::warn!(
                        "Rate limit reached, waiting {}s until {}",
                        wait.as_secs(),
                        state.reset_at
                    );
                    clock.sleep(wait + self.margin, cancel)
                }
                _ => clock.sleep(self.poll_interval, cancel),
            };
            if !slept {
                break;
            }
        }

        log::debug!(
            "Rate guard stopped after {} polls ({} waits)",
            stats.polls,
            stats.waits
        );
        stats
    }
}
