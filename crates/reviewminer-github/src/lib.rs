//! Reviewminer GitHub - review-comment harvester
//!
//! Drains a queue of repositories with a fixed pool of workers, walking each
//! repository's pull-request review comments page by page, and writes one
//! JSON shard per repository. A background guard keeps an eye on the API's
//! rate budget; an operator interrupt unwinds every loop cooperatively.

pub mod api;
pub mod config;
pub mod fetch;
pub mod rate;
pub mod record;
pub mod runner;
pub mod sanitize;
pub mod shard;
pub mod stats;
pub mod target;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-exports
pub use api::{GitHubClient, RateState, RawComment, ReviewApi};
pub use config::Config;
pub use runner::{run, run_with};
pub use stats::{RunSummary, TargetOutcome, TargetStats};
pub use target::Target;
