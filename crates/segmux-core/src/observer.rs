//! Event sink for session progress. All methods default to no-ops.

use std::path::Path;

/// Receives session events. Calls may come from any thread; progress and
/// speed events are serialised by the progress reporter.
pub trait Observer: Send + Sync {
    /// The session failed. Never called for a user cancellation.
    fn on_error(&self, _message: &str) {}
    /// Informational text: current step, retries, current throughput.
    fn on_message(&self, _message: &str) {}
    /// Overall fraction in `[0.0, 1.0]`.
    fn on_progress_update(&self, _fraction: f64) {}
    fn on_running_state_changed(&self, _running: bool) {}
    fn on_finished(&self, _output: &Path) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}
