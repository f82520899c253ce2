//! Reviewminer Core - shared infrastructure for the review-comment harvester
//!
//! Cancellation, the work queue, interruptible sleeps, the HTTP runtime,
//! error types, logging and progress reporting. Nothing in here knows about
//! GitHub.

pub mod clock;
pub mod error;
pub mod http;
pub mod logging;
pub mod progress;
pub mod shutdown;
pub mod work_queue;

// Re-exports for convenience
pub use clock::{Clock, SystemClock, later_by};
pub use error::ShardError;
pub use http::{HttpConfig, HttpError, SHARED_RUNTIME, build_client, get_json};
pub use logging::{IndicatifLogger, Verbosity, init_logging};
pub use progress::{ProgressContext, SharedProgress};
pub use shutdown::{install_signal_handlers, is_cancelled, request_cancel, shutdown_flag};
pub use work_queue::WorkQueue;

#[cfg(any(test, feature = "test-support"))]
pub use clock::ManualClock;
