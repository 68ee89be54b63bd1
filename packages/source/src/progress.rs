//! Progress reporting for batch runs.
//!
//! [`ProgressCallback`] keeps the orchestrator independent of how progress
//! is shown. The CLI plugs in `indicatif` bars; library callers and tests
//! use [`null_progress`].

use std::sync::Arc;

/// Receives progress updates from a running pipeline.
///
/// Implementations must be `Send + Sync` because updates arrive from
/// whichever task finishes a batch.
pub trait ProgressCallback: Send + Sync {
    /// Set the total number of units (years) expected.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
