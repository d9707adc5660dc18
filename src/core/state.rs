//! Process-wide run state.
//!
//! - `SHUTDOWN`: Has shutdown been requested? (Ctrl+C received)

use std::sync::atomic::{AtomicBool, Ordering};

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

// =============================================================================
// SHUTDOWN state
// =============================================================================

/// Setup the global Ctrl+C handler. Call once at program start
///
/// The first Ctrl+C only sets the SHUTDOWN flag: the running pass kills its
/// child, the access monitor is stopped and the temporary workspace is
/// dropped on the way out. A second Ctrl+C exits immediately.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        crate::log!("pack"; "interrupted, cleaning up (press Ctrl+C again to force)");
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Check if shutdown has been requested
///
/// Uses Relaxed ordering for performance - worst case is one more poll
/// of the running child before it is killed
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Return `Err(Cancelled)` once shutdown has been requested.
pub fn check_shutdown() -> Result<(), crate::error::PackError> {
    if is_shutdown() {
        Err(crate::error::PackError::Cancelled)
    } else {
        Ok(())
    }
}
