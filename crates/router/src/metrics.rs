// Metrics hooks for the `router` crate.
//
// Callers install a global `BatchMetrics` implementation via [`set_batch_metrics`],
// then every `BatchRouter` reports per-batch counters and latency once the batch
// has been routed. No metrics backend is linked here.
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::batch::BatchReport;

/// Metrics observer for routed batches.
pub trait BatchMetrics: Send + Sync {
    /// Record one routed batch.
    ///
    /// `report` carries the batch counters and send/delete results, `latency`
    /// is the wall-clock time from classification to the end of the delete.
    fn record_batch(&self, report: &BatchReport, latency: Duration);
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn BatchMetrics>>> {
    static METRICS: OnceCell<RwLock<Option<Arc<dyn BatchMetrics>>>> = OnceCell::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn BatchMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

/// Install or clear the global batch metrics recorder.
pub fn set_batch_metrics(recorder: Option<Arc<dyn BatchMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}
