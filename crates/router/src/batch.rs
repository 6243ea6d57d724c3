use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Instant;

use cache::DedupCache;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, Instrument};
use validate::Validator;

use crate::annotate::{annotate_failure, DUPLICATE_REASON};
use crate::classify::{classify_message, MessageOutcome};
use crate::error::RouterError;
use crate::metrics::metrics_recorder;
use crate::queue::{DeleteEntry, QueueClient, QueueTransport, RawMessage};

/// Tallies for one batch, or summed across the batches of an invocation.
///
/// `rejected` counts every payload placed on the rejected stream, duplicates
/// included; `duplicates` is that subset. `processed` counts messages that
/// reached a final decision and were queued for deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounters {
    pub processed: u64,
    pub duplicates: u64,
    pub rejected: u64,
}

impl BatchCounters {
    pub fn merge(&mut self, other: &BatchCounters) {
        self.processed += other.processed;
        self.duplicates += other.duplicates;
        self.rejected += other.rejected;
    }
}

impl AddAssign for BatchCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}

/// One input batch split into its outbound streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedBatch {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub acknowledgeable: Vec<DeleteEntry>,
    /// Messages left on the source queue for redelivery.
    pub deferred: usize,
}

/// Tunables for routing.
///
/// ```yaml
/// annotate_duplicates: false
/// duplicate_reason: duplicate
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Add `failureReason` to duplicate payloads. Off by default: duplicates
    /// are forwarded exactly as received.
    ///
    /// Default: `false`
    pub annotate_duplicates: bool,

    /// Reason written into duplicate payloads.
    ///
    /// Default: `"duplicate"`
    pub duplicate_reason: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            annotate_duplicates: false,
            duplicate_reason: DUPLICATE_REASON.to_string(),
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.annotate_duplicates && self.duplicate_reason.trim().is_empty() {
            return Err(RouterError::InvalidConfig(
                "duplicate_reason must not be empty when annotate_duplicates is set",
            ));
        }
        Ok(())
    }
}

/// The three queues a router talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueUrls {
    /// Queue messages are received from and deleted on.
    pub source: String,
    /// Destination for unique, valid tenders.
    pub accepted: String,
    /// Destination for duplicates and rejected payloads.
    pub rejected: String,
}

impl QueueUrls {
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.source.trim().is_empty() {
            return Err(RouterError::InvalidQueue("source"));
        }
        if self.accepted.trim().is_empty() {
            return Err(RouterError::InvalidQueue("accepted"));
        }
        if self.rejected.trim().is_empty() {
            return Err(RouterError::InvalidQueue("rejected"));
        }
        Ok(())
    }
}

/// What happened to one routed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub counters: BatchCounters,
    pub accepted_sent: usize,
    pub rejected_sent: usize,
    pub deleted: usize,
    pub delete_failed: usize,
    pub deferred: usize,
}

/// Classifies batches and drives their sends and deletes.
pub struct BatchRouter<T> {
    client: QueueClient<T>,
    validator: Validator,
    cache: Arc<DedupCache>,
    queues: QueueUrls,
    config: RouterConfig,
}

impl<T: QueueTransport> BatchRouter<T> {
    pub fn new(
        client: QueueClient<T>,
        validator: Validator,
        cache: Arc<DedupCache>,
        queues: QueueUrls,
        config: RouterConfig,
    ) -> Result<Self, RouterError> {
        queues.validate()?;
        config.validate()?;
        Ok(Self {
            client,
            validator,
            cache,
            queues,
            config,
        })
    }

    pub fn client(&self) -> &QueueClient<T> {
        &self.client
    }

    pub fn queues(&self) -> &QueueUrls {
        &self.queues
    }

    pub fn cache(&self) -> &Arc<DedupCache> {
        &self.cache
    }

    /// Classifies `messages` against the wall clock.
    pub fn classify(&self, messages: &[RawMessage]) -> (ClassifiedBatch, BatchCounters) {
        self.classify_at(messages, Utc::now())
    }

    /// Classifies `messages` as of `now`. No I/O.
    pub fn classify_at(
        &self,
        messages: &[RawMessage],
        now: DateTime<Utc>,
    ) -> (ClassifiedBatch, BatchCounters) {
        let mut batch = ClassifiedBatch::default();
        let mut counters = BatchCounters::default();

        for message in messages {
            let outcome = classify_message(message, &self.validator, &self.cache, now);
            if outcome.is_terminal() {
                batch.acknowledgeable.push(DeleteEntry::from(message));
                counters.processed += 1;
            }
            match outcome {
                MessageOutcome::Accepted { body } => batch.accepted.push(body),
                MessageOutcome::Rejected { body, reason } => {
                    let body = match reason {
                        Some(reason) => annotate_failure(&body, &reason),
                        None => body,
                    };
                    batch.rejected.push(body);
                    counters.rejected += 1;
                }
                MessageOutcome::Duplicate { body } => {
                    let body = if self.config.annotate_duplicates {
                        annotate_failure(&body, &self.config.duplicate_reason)
                    } else {
                        body
                    };
                    batch.rejected.push(body);
                    counters.rejected += 1;
                    counters.duplicates += 1;
                }
                MessageOutcome::Deferred { .. } => batch.deferred += 1,
            }
        }

        (batch, counters)
    }

    /// Routes one batch: classify, send both streams concurrently, then delete.
    ///
    /// If either send fails nothing is deleted and the error is returned; the
    /// whole batch is redelivered after its visibility timeout.
    pub async fn process_batch(&self, messages: &[RawMessage]) -> Result<BatchReport, RouterError> {
        let span = info_span!("batch", size = messages.len());
        self.route(messages).instrument(span).await
    }

    async fn route(&self, messages: &[RawMessage]) -> Result<BatchReport, RouterError> {
        let started = Instant::now();
        let (batch, counters) = self.classify(messages);

        let (accepted, rejected) = tokio::join!(
            self.client.send_batch(&self.queues.accepted, &batch.accepted),
            self.client.send_batch(&self.queues.rejected, &batch.rejected),
        );
        let (accepted, rejected) = match (accepted, rejected) {
            (Ok(accepted), Ok(rejected)) => (accepted, rejected),
            (Err(err), _) | (_, Err(err)) => {
                error!(
                    error = %err,
                    pending_deletes = batch.acknowledgeable.len(),
                    "routing failed; batch left on source queue"
                );
                return Err(err);
            }
        };

        let deletion = self
            .client
            .delete_batch(&self.queues.source, &batch.acknowledgeable)
            .await;

        let report = BatchReport {
            counters,
            accepted_sent: accepted.sent,
            rejected_sent: rejected.sent,
            deleted: deletion.deleted,
            delete_failed: deletion.failed,
            deferred: batch.deferred,
        };

        info!(
            unique = batch.accepted.len(),
            rejected = counters.rejected,
            duplicates = counters.duplicates,
            deleted = deletion.deleted,
            deferred = batch.deferred,
            "batch processed"
        );

        if let Some(recorder) = metrics_recorder() {
            recorder.record_batch(&report, started.elapsed());
        }
        Ok(report)
    }
}
