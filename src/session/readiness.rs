//! Readiness flag shared by the event context and the playback worker

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide idle/busy arbiter.
///
/// `true` means a new capture may start. The only way to go busy is
/// [`Readiness::try_acquire`], which flips the flag atomically, so two
/// writers can never both believe they started a capture.
#[derive(Debug, Clone)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    /// Create a flag in the ready state
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Go busy if currently ready. Returns false if already busy.
    pub fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark ready (playback finished, capture failed, or link dropped)
    pub fn release(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}
