//! Shared run state
//!
//! One [`RunState`] is shared by every worker of a run. The tracked process
//! set and the cancellation transition sit behind a single mutex, so a
//! process can never be registered after the cancelling snapshot was taken
//! without noticing the cancellation.

use crate::supervisor::ProcessHandle;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Why a run was cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// A child printed the success string
    SuccessFound { index: usize, needle: String },
    /// The operator interrupted the run
    Interrupted,
}

#[derive(Default)]
struct Tracked {
    reason: Option<CancelReason>,
    active: Vec<Arc<ProcessHandle>>,
    peak: usize,
}

/// Cancellation flag plus the set of running children
#[derive(Default)]
pub struct RunState {
    tracked: Mutex<Tracked>,
    // Mirrors `tracked.reason.is_some()` for lock-free polling
    cancelled: AtomicBool,
    // Operator interrupts, counted apart from the cancel reason
    interrupts: AtomicUsize,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.lock().reason.clone()
    }

    /// True once the operator interrupted, even if the success string
    /// cancelled the run first
    pub fn was_interrupted(&self) -> bool {
        self.interrupts.load(Ordering::Acquire) > 0
            || matches!(self.reason(), Some(CancelReason::Interrupted))
    }

    /// Count one operator interrupt. Returns the number recorded so far.
    pub fn record_interrupt(&self) -> usize {
        self.interrupts.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Track a running child. Returns `false`, without tracking it, when the
    /// run is already cancelled; the caller must then stop the child itself.
    pub fn register(&self, handle: Arc<ProcessHandle>) -> bool {
        let mut tracked = self.lock();
        if tracked.reason.is_some() {
            return false;
        }
        log::debug!("tracking attack #{} (pid {})", handle.index() + 1, handle.pid());
        tracked.active.push(handle);
        tracked.peak = tracked.peak.max(tracked.active.len());
        true
    }

    /// Stop tracking the child of task `index`
    pub fn deregister(&self, index: usize) {
        self.lock().active.retain(|h| h.index() != index);
    }

    /// Flip the run to cancelled. Only the first call wins: it gets the
    /// snapshot of children to terminate, later calls get `None`.
    pub fn cancel(&self, reason: CancelReason) -> Option<Vec<Arc<ProcessHandle>>> {
        let mut tracked = self.lock();
        if tracked.reason.is_some() {
            return None;
        }
        log::debug!("run cancelled: {:?}", reason);
        tracked.reason = Some(reason);
        self.cancelled.store(true, Ordering::Release);
        Some(tracked.active.clone())
    }

    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }

    /// Highest number of children tracked at the same time
    pub fn peak_active(&self) -> usize {
        self.lock().peak
    }
}
