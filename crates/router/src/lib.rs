//! Tender batch routing
//!
//! Splits a batch of raw queue messages into an accepted stream and a rejected
//! stream, then ships both through a [`QueueClient`] and deletes whatever reached
//! a final decision.
//!
//! ## Per-message decisions
//!
//! | Input | Outcome | Deleted |
//! |---|---|---|
//! | invalid JSON or not an object | rejected, body unchanged | yes |
//! | closing date before today (UTC) | rejected, `failureReason` added | yes |
//! | blank `source` or `tenderNumber` | accepted | yes |
//! | known `(source, tenderNumber)` | rejected as duplicate, body unchanged | yes |
//! | otherwise | accepted | yes |
//! | cache not ready | deferred | no |
//!
//! Both streams are sent concurrently. The delete only runs once both sends
//! succeeded, so a failed send leaves the whole batch for redelivery.
mod annotate;
mod batch;
mod classify;
mod error;
mod metrics;
mod queue;

pub use crate::annotate::{annotate_failure, DUPLICATE_REASON, FAILURE_REASON_FIELD};
pub use crate::batch::{
    BatchCounters, BatchReport, BatchRouter, ClassifiedBatch, QueueUrls, RouterConfig,
};
pub use crate::classify::{classify_message, MessageOutcome, SOURCE_FIELD, TENDER_NUMBER_FIELD};
pub use crate::error::{RouterError, TransportError};
pub use crate::metrics::{set_batch_metrics, BatchMetrics};
pub use crate::queue::{
    group_id_for, is_fifo_queue, DeleteEntry, DeleteSummary, EntryFailure, EntryReport,
    OutboundEntry, QueueClient, QueueTransport, RawMessage, ReceiveOptions, SendSummary,
    DEFAULT_GROUP_ID, GROUP_ID_FIELD, MAX_BATCH_SIZE,
};
