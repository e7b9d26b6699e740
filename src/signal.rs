//! Ctrl+C handling.
//!
//! A single process-wide `AtomicBool` is raised on interrupt. The scanner and
//! the scorer poll it and unwind with a cancellation error, which the binary
//! maps to exit code 130.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code for SIGINT (128 + 2).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

static GLOBAL_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Install the Ctrl+C hook and return the shared shutdown flag.
///
/// The hook is registered once per process. Later calls (for example from
/// tests that call `run_app` repeatedly) get the same flag back, reset to
/// `false`. If another hook is already registered, an unhooked flag is
/// returned so callers still work.
pub fn install_handler() -> Arc<AtomicBool> {
    let flag = GLOBAL_FLAG.get_or_init(|| {
        let flag = Arc::new(AtomicBool::new(false));
        let hook = Arc::clone(&flag);
        let installed = ctrlc::set_handler(move || {
            hook.store(true, Ordering::SeqCst);
            let _ = writeln!(std::io::stderr(), "\nInterrupted. Cleaning up...");
            let _ = std::io::stderr().flush();
            log::info!("Shutdown signal received");
        });
        if let Err(e) = installed {
            log::debug!("Ctrl+C handler not installed: {}", e);
        }
        flag
    });
    flag.store(false, Ordering::SeqCst);
    Arc::clone(flag)
}

/// Whether the flag has been raised.
#[must_use]
pub fn is_shutdown_requested(flag: &AtomicBool) -> bool {
    flag.load(Ordering::SeqCst)
}
