//! Cooperative cancellation via a set-once atomic flag
//!
//! Every long-running loop takes the flag by reference and checks it at its
//! iteration boundary. The process-wide instance is set by the signal
//! handlers; tests pass their own.

use std::sync::atomic::{AtomicBool, Ordering};

/// Exit status used when a second interrupt forces termination
const FORCED_EXIT_STATUS: i32 = 130;

/// Process-wide cancellation flag, set by SIGINT/SIGTERM
pub fn shutdown_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

/// Check whether cancellation was requested on `flag`
pub fn is_cancelled(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Relaxed)
}

/// Set `flag`, returning whether it was already set.
///
/// The flag is never cleared afterwards.
pub fn request_cancel(flag: &AtomicBool) -> bool {
    flag.swap(true, Ordering::Relaxed)
}

/// Route SIGINT and SIGTERM to [`shutdown_flag`].
///
/// First signal: set the flag and let the loops unwind.
/// Second signal: exit immediately with status 130.
pub fn install_signal_handlers() -> std::io::Result<()> {
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
        unsafe {
            signal_hook::low_level::register(signal, || {
                if request_cancel(shutdown_flag()) {
                    std::process::exit(FORCED_EXIT_STATUS);
                }
            })?;
        }
    }
    Ok(())
}
