//! Signal/cancellation bridge.
//!
//! A shared atomic flag the orchestrator polls every loop iteration, plus a
//! concurrent emergency watchdog thread that is a last-resort guard: a
//! well-behaved orchestrator should never let this fire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, warn};

/// Distinct non-zero exit code used when the emergency watchdog forcibly
/// terminates the process.
pub const EMERGENCY_EXIT_CODE: i32 = 2;

const EMERGENCY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const EMERGENCY_GRACE: Duration = Duration::from_secs(2);

/// Owns the shared cancellation flag and the emergency watchdog thread.
///
/// Dropping the bridge (normally via [`CancellationBridge::disarm`] at the
/// end of a successful `run()`) stops the watchdog before it ever fires.
pub struct CancellationBridge {
    cancel_flag: Arc<AtomicBool>,
    disarm_flag: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CancellationBridge {
    /// Spawns the watchdog thread and returns a bridge wired to the given
    /// external cancel flag (the one the glue layer's Ctrl+C handler also
    /// sets).
    pub fn arm(cancel_flag: Arc<AtomicBool>) -> Self {
        let disarm_flag = Arc::new(AtomicBool::new(false));
        let watchdog_cancel = Arc::clone(&cancel_flag);
        let watchdog_disarm = Arc::clone(&disarm_flag);

        let handle = thread::Builder::new()
            .name("capture-emergency-watchdog".into())
            .spawn(move || emergency_watchdog_loop(watchdog_cancel, watchdog_disarm))
            .expect("failed to spawn emergency watchdog thread");

        Self { cancel_flag, disarm_flag, handle: Mutex::new(Some(handle)) }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    /// Stops the watchdog thread without waiting for its timeout — called
    /// once the orchestrator has torn down cleanly.
    pub fn disarm(&self) {
        self.disarm_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CancellationBridge {
    fn drop(&mut self) {
        self.disarm();
    }
}

fn emergency_watchdog_loop(cancel_flag: Arc<AtomicBool>, disarm_flag: Arc<AtomicBool>) {
    let poll_interval = Duration::from_millis(200);
    let mut waited = Duration::ZERO;

    while waited < EMERGENCY_TIMEOUT {
        if disarm_flag.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep(poll_interval);
        waited += poll_interval;
    }

    if disarm_flag.load(Ordering::SeqCst) {
        return;
    }

    warn!(event = "emergency_watchdog_triggered", "5 minute emergency watchdog elapsed, requesting cancellation");
    cancel_flag.store(true, Ordering::SeqCst);

    let grace_interval = Duration::from_millis(100);
    let mut grace_waited = Duration::ZERO;
    while grace_waited < EMERGENCY_GRACE {
        if disarm_flag.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep(grace_interval);
        grace_waited += grace_interval;
    }

    if disarm_flag.load(Ordering::SeqCst) {
        return;
    }

    error!(event = "emergency_watchdog_kill", "orchestrator did not stop within the grace period, terminating process");
    std::process::exit(EMERGENCY_EXIT_CODE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarm_stops_the_watchdog_thread_promptly() {
        let flag = Arc::new(AtomicBool::new(false));
        let bridge = CancellationBridge::arm(Arc::clone(&flag));
        bridge.disarm();
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_flag_is_shared_with_the_caller() {
        let flag = Arc::new(AtomicBool::new(false));
        let bridge = CancellationBridge::arm(Arc::clone(&flag));
        flag.store(true, Ordering::SeqCst);
        assert!(bridge.is_cancelled());
        bridge.disarm();
    }
}
