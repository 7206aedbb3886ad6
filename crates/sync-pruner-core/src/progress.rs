use crate::analysis::Status;

/// Trait for reporting scan and prune progress.
///
/// The CLI implements it with indicatif; tests use [`SilentReporter`].
/// All methods have default no-op implementations and may be called from
/// worker threads.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _total_experiments: usize) {}
    fn on_experiment_classified(&self, _name: &str, _status: Status) {}
    fn on_scan_complete(&self, _total_experiments: usize, _duration_secs: f64) {}
    fn on_execute_start(&self, _to_remove: usize, _to_prune: usize) {}
    fn on_experiment_executed(&self, _name: &str) {}
    fn on_execute_complete(&self, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
