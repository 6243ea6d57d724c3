//! Workspace umbrella crate for the tender deduplication pipeline.
//!
//! Re-exports the validator, the dedup cache and the batch router, and owns
//! the YAML [`PipelineConfig`] that ties them together. The queue-facing
//! worker binary lives in the `tender-worker` crate.

pub mod config;

pub use cache::{
    default_source_tables, CacheError, CacheStats, DedupCache, InMemoryRepository,
    RepositoryError, SourceTable, TenderKey, TenderRepository, DEFAULT_TENDER_NUMBER_COLUMN,
};
#[cfg(feature = "backend-postgres")]
pub use cache::PostgresRepository;
pub use router::{
    annotate_failure, set_batch_metrics, BatchCounters, BatchMetrics, BatchReport, BatchRouter,
    ClassifiedBatch, DeleteEntry, EntryFailure, EntryReport, MessageOutcome, OutboundEntry,
    QueueClient, QueueTransport, QueueUrls, RawMessage, ReceiveOptions, RouterConfig,
    RouterError, TransportError, DEFAULT_GROUP_ID, DUPLICATE_REASON, FAILURE_REASON_FIELD,
    MAX_BATCH_SIZE,
};
pub use validate::{
    ClosingTimestamp, ValidationOutcome, Validator, ValidatorConfig,
    ConfigError as ValidatorConfigError,
};

pub use crate::config::{CacheYamlConfig, ConfigLoadError, PipelineConfig, PollYamlConfig};

use std::sync::Arc;

/// Builds a [`BatchRouter`] from YAML configuration, a transport and a cache.
///
/// The cache is shared so several routers (or invocations) in one process
/// reuse a single population pass.
pub fn build_router<T: QueueTransport>(
    config: &PipelineConfig,
    transport: T,
    cache: Arc<DedupCache>,
    queues: QueueUrls,
) -> Result<BatchRouter<T>, ConfigLoadError> {
    let validator = config.build_validator()?;
    BatchRouter::new(
        QueueClient::new(transport),
        validator,
        cache,
        queues,
        config.router.clone(),
    )
    .map_err(|err| ConfigLoadError::Validation(err.to_string()))
}
