//! `metrics`-crate bridge for batch observations.
//!
//! Whatever recorder the host installs for the `metrics` facade receives these
//! series; with no recorder installed the calls are no-ops.
use std::sync::Arc;
use std::time::Duration;

use router::{set_batch_metrics, BatchMetrics, BatchReport};

pub const PROCESSED_TOTAL: &str = "tender_messages_processed_total";
pub const DUPLICATES_TOTAL: &str = "tender_duplicates_total";
pub const REJECTED_TOTAL: &str = "tender_rejected_total";
pub const DEFERRED_TOTAL: &str = "tender_deferred_total";
pub const BATCH_SECONDS: &str = "tender_batch_seconds";

/// Forwards batch reports to the global `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeMetrics;

impl BatchMetrics for FacadeMetrics {
    fn record_batch(&self, report: &BatchReport, latency: Duration) {
        metrics::counter!(PROCESSED_TOTAL).increment(report.counters.processed);
        metrics::counter!(DUPLICATES_TOTAL).increment(report.counters.duplicates);
        metrics::counter!(REJECTED_TOTAL).increment(report.counters.rejected);
        metrics::counter!(DEFERRED_TOTAL).increment(report.deferred as u64);
        metrics::histogram!(BATCH_SECONDS).record(latency.as_secs_f64());
    }
}

/// Installs [`FacadeMetrics`] as the router's batch observer.
pub fn install() {
    set_batch_metrics(Some(Arc::new(FacadeMetrics)));
}
