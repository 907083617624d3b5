//! Progress reporting for batch runs.
//!
//! [`BatchRunner`](crate::BatchRunner) reports one unit per subject. The CLI
//! renders it with `indicatif`; tests use [`NullProgress`].

/// Receives batch progress.
pub trait ProgressCallback: Send + Sync {
    /// Number of subjects in the batch.
    fn set_total(&self, total: u64);

    /// `delta` more subjects are done.
    fn inc(&self, delta: u64);

    /// The subject being analyzed.
    fn set_message(&self, msg: String);

    /// The batch is over; `msg` summarizes it.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}
