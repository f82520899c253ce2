//! Wall clock and cancellation-aware sleeping.
//!
//! Loops never call `std::thread::sleep` directly: they sleep through a
//! [`Clock`], which returns early once the cancellation flag is set. The
//! system clock sleeps in short slices so an interrupt is honoured within
//! roughly [`SLEEP_SLICE`].

use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::shutdown::is_cancelled;

/// Granularity at which [`SystemClock`] re-checks the cancellation flag
pub const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// `t + d`, saturating at the far end of the calendar
pub fn later_by(t: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|delta| t.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Source of time and sleeps for the harvest loops.
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;

    /// Sleep for `duration` unless `cancel` is set.
    ///
    /// Returns `true` if the full duration elapsed, `false` if cut short by
    /// cancellation (including when the flag was already set on entry).
    fn sleep(&self, duration: Duration, cancel: &AtomicBool) -> bool;

    /// Sleep until `deadline` (no-op if it already passed).
    fn sleep_until(&self, deadline: DateTime<Utc>, cancel: &AtomicBool) -> bool {
        let wait = (deadline - self.now()).to_std().unwrap_or(Duration::ZERO);
        self.sleep(wait, cancel)
    }
}

/// Real time, sliced sleeps
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration, cancel: &AtomicBool) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if is_cancelled(cancel) {
                return false;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return true;
            }
            std::thread::sleep(left.min(SLEEP_SLICE));
        }
    }
}

/// Virtual clock for tests: sleeps return immediately, advance `now()` and
/// are recorded.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
    sleeps: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(any(test, feature = "test-support"))]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
            sleeps: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Every completed or interrupted sleep request, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = later_by(*now, by);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration, cancel: &AtomicBool) -> bool {
        if is_cancelled(cancel) {
            return false;
        }
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
        std::thread::yield_now();
        !is_cancelled(cancel)
    }
}
