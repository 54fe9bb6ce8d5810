//! Busy-wait governor: per-domain spin/back-off/stall-logging state.
//!
//! Grounded in the same spin-then-fallback shape as the teacher's wait
//! strategies, but with a fixed contract instead of a pluggable trait: log once
//! after 10ms of spinning on an unchanged target, then fall back to a coarse
//! 1ms sleep on the assumption a peer is paused rather than merely slow.
//! State lives on the governor instance, never in a process-wide static, so
//! that a channel's governor and a clock's governor never interfere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::constants::{GOVERNOR_BACKOFF_MILLIS, GOVERNOR_STALL_THRESHOLD_MILLIS};

/// Cooperative cancellation token observed by every governed spin.
///
/// Cloning shares the same underlying flag; setting it from any clone is
/// visible to every spin loop holding another clone.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that starts un-cancelled.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation; observed by spins on the next iteration.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Per-site busy-wait state: one `Governor` per spin location (a channel's
/// insert-wait, a sink's drain-wait, a clock's horizon-wait), never shared
/// process-wide.
pub struct Governor {
    current_target: Option<u64>,
    start_wait_at: Option<Instant>,
    was_logged: bool,
}

impl Default for Governor {
    fn default() -> Self {
        Self::new()
    }
}

impl Governor {
    /// Create a fresh governor with no wait in progress.
    pub fn new() -> Self {
        Self { current_target: None, start_wait_at: None, was_logged: false }
    }

    /// Run one iteration of a governed spin against `target`, identified by
    /// `name` in diagnostics. `available` is the current value being watched
    /// (e.g. a watermark or ring-buffer free space) purely for logging.
    ///
    /// Callers loop calling this until their condition is satisfied; it never
    /// blocks longer than the coarse back-off sleep.
    pub fn iterate(&mut self, available: u64, target: u64, name: &str) {
        if self.was_logged {
            std::thread::sleep(std::time::Duration::from_millis(GOVERNOR_BACKOFF_MILLIS));
            return;
        }

        if self.current_target != Some(target) {
            self.current_target = Some(target);
            self.start_wait_at = Some(Instant::now());
            self.was_logged = false;
            std::hint::spin_loop();
            return;
        }

        let elapsed = self
            .start_wait_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        if elapsed >= GOVERNOR_STALL_THRESHOLD_MILLIS {
            warn!(channel = name, available, target, elapsed_ms = elapsed, "busy-wait stalled");
            self.was_logged = true;
        } else {
            std::hint::spin_loop();
        }
    }

    /// Call once the awaited condition is satisfied; emits the matching "done"
    /// diagnostic if a stall was previously logged, and resets the governor.
    pub fn done(&mut self, name: &str) {
        if self.was_logged {
            debug!(channel = name, "busy-wait done");
        }
        self.current_target = None;
        self.start_wait_at = None;
        self.was_logged = false;
    }
}

/// Checked by every governed spin: if `exit` has been requested, print the
/// normal-exit line and terminate the process successfully. A domain asking
/// to stop mid-spin is a graceful shutdown, not an error — returning control
/// to the caller would let it observe a half-advanced, desynchronized clock.
pub fn check_exit(exit: &CancelToken, debug_name: &str) {
    if exit.is_cancelled() {
        info!(domain = debug_name, "normal exit");
        std::process::exit(0);
    }
}
