//! Progress reporting and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Keystream position reported at each block boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Total bytes requested.
    pub total: u64,
    /// Bytes emitted so far.
    pub written: u64,
    /// Bytes still to emit.
    pub remaining: u64,
}

impl Progress {
    /// Whole percent complete, rounded down.
    pub fn percent_complete(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (self.written.saturating_mul(100) / self.total).min(100) as u8
    }
}

/// Receives progress from a running keystream.
///
/// Called synchronously on the thread driving the keystream. Callers that
/// run the cipher on a worker thread are responsible for forwarding the
/// updates wherever they are displayed.
pub trait ProgressObserver {
    /// Called once per emitted block.
    fn on_progress(&mut self, progress: Progress);
}

impl<F> ProgressObserver for F
where
    F: FnMut(Progress),
{
    fn on_progress(&mut self, progress: Progress) {
        self(progress)
    }
}

/// Observer that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _progress: Progress) {}
}

/// Shared flag used to stop a keystream at the next block boundary.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
