//! Scripted [`ReviewApi`] for tests: canned page sizes, injected failures,
//! call recording and cancellation triggers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use reviewminer_core::http::HttpError;
use reviewminer_core::{Clock, ManualClock, request_cancel};

use crate::api::{RateState, RawComment, ReviewApi};
use crate::target::Target;

#[derive(Default)]
pub struct ScriptedApi {
    rate: Mutex<VecDeque<Result<RateState, HttpError>>>,
    rate_polls: Mutex<Vec<DateTime<Utc>>>,
    page_sizes: HashMap<Target, Vec<usize>>,
    failures: Mutex<HashMap<(Target, u32), usize>>,
    calls: Mutex<Vec<(Target, u32)>>,
    served_pages: Mutex<usize>,
    clock: Option<Arc<ManualClock>>,
    cancel_after_rate: Option<(usize, Arc<AtomicBool>)>,
    cancel_after_pages: Option<(usize, Arc<AtomicBool>)>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp rate polls with this clock instead of real time
    pub fn with_clock(mut self, clock: Arc<ManualClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Rate replies in order; once used up, a generous budget is reported
    pub fn with_rate(mut self, replies: Vec<Result<RateState, HttpError>>) -> Self {
        self.rate = Mutex::new(replies.into());
        self
    }

    /// Successful pages for `target` carry these many comments, page 1
    /// first; pages past the list are empty
    pub fn with_pages(mut self, target: Target, sizes: Vec<usize>) -> Self {
        self.page_sizes.insert(target, sizes);
        self
    }

    /// The first `times` requests for `page` of `target` fail with a 502
    pub fn failing(self, target: Target, page: u32, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert((target, page), times);
        self
    }

    /// Set `flag` once `polls` rate queries have been answered
    pub fn cancel_after_rate_polls(mut self, polls: usize, flag: Arc<AtomicBool>) -> Self {
        self.cancel_after_rate = Some((polls, flag));
        self
    }

    /// Set `flag` once `pages` comment pages have been served successfully
    pub fn cancel_after_pages(mut self, pages: usize, flag: Arc<AtomicBool>) -> Self {
        self.cancel_after_pages = Some((pages, flag));
        self
    }

    /// Every comments request, in the order received
    pub fn calls(&self) -> Vec<(Target, u32)> {
        self.calls.lock().unwrap().clone()
    }

    /// Page numbers requested for one target
    pub fn pages_requested(&self, target: &Target) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter(|(t, _)| t == target)
            .map(|(_, page)| page)
            .collect()
    }

    pub fn rate_poll_times(&self) -> Vec<DateTime<Utc>> {
        self.rate_polls.lock().unwrap().clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.as_ref().map_or_else(Utc::now, |c| c.now())
    }
}

/// Deterministic comment body so tests can tell pages apart
pub fn scripted_comment(target: &Target, page: u32, i: usize) -> RawComment {
    RawComment {
        pull_request_url: format!("https://api.github.com/repos/{target}/pulls/{page}"),
        diff_hunk: format!("@@ -{i} +{i} @@\n+let x = {i}; // note {page}\n"),
        body: format!("comment {page}.{i}"),
    }
}

impl ReviewApi for ScriptedApi {
    fn rate_limit(&self) -> Result<RateState, HttpError> {
        let now = self.now();
        let polls = {
            let mut polls = self.rate_polls.lock().unwrap();
            polls.push(now);
            polls.len()
        };
        let reply = self.rate.lock().unwrap().pop_front().unwrap_or(Ok(RateState {
            remaining: 5000,
            reset_at: now + chrono::Duration::hours(1),
        }));
        if let Some((after, flag)) = &self.cancel_after_rate {
            if polls >= *after {
                request_cancel(flag);
            }
        }
        reply
    }

    fn comments_page(&self, target: &Target, page: u32) -> Result<Vec<RawComment>, HttpError> {
        self.calls.lock().unwrap().push((target.clone(), page));

        if let Some(left) = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&(target.clone(), page))
        {
            if *left > 0 {
                *left -= 1;
                return Err(HttpError::Http {
                    status: Some(502),
                    message: "Bad Gateway".to_string(),
                });
            }
        }

        let size = self
            .page_sizes
            .get(target)
            .and_then(|sizes| sizes.get(page as usize - 1))
            .copied()
            .unwrap_or(0);
        let comments = (0..size)
            .map(|i| scripted_comment(target, page, i))
            .collect();

        let served = {
            let mut served = self.served_pages.lock().unwrap();
            *served += 1;
            *served
        };
        if let Some((after, flag)) = &self.cancel_after_pages {
            if served >= *after {
                request_cancel(flag);
            }
        }
        Ok(comments)
    }
}
