use std::sync::Arc;

use cache::{DedupCache, PostgresRepository};
use router::QueueUrls;
use tender_dedup::PipelineConfig;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::orchestrator::{Orchestrator, PollConfig};
use crate::sqs::SqsTransport;

/// Everything one worker process shares across invocations
pub struct WorkerState {
    /// Parsed pipeline YAML
    pub pipeline: Arc<PipelineConfig>,

    /// Dedup cache, populated lazily on the first invocation
    pub cache: Arc<DedupCache>,

    /// Invocation driver over the SQS transport
    pub orchestrator: Orchestrator<SqsTransport>,
}

impl WorkerState {
    /// Wire the database pool, cache, SQS client and router together.
    ///
    /// No network traffic happens here; the database pool connects lazily and
    /// the cache is populated by the first invocation.
    pub async fn build(config: WorkerConfig) -> WorkerResult<Self> {
        let pipeline = config.pipeline()?;

        let repository = PostgresRepository::connect_lazy(
            &config.db_connection_string,
            config.db_max_connections,
            pipeline.cache.sources.clone(),
            &pipeline.cache.tender_number_column,
        )?;
        let cache = Arc::new(DedupCache::new(Arc::new(repository)));

        let transport = SqsTransport::from_env().await;
        let queues = QueueUrls {
            source: config.source_queue_url.clone(),
            accepted: config.ai_queue_url.clone(),
            rejected: config.duplicate_queue_url.clone(),
        };
        let router = tender_dedup::build_router(&pipeline, transport, cache.clone(), queues)?;
        let orchestrator = Orchestrator::new(Arc::new(router), PollConfig::from(&pipeline.poll));

        tracing::info!(
            sources = pipeline.cache.sources.len(),
            source_queue = %config.source_queue_url,
            "worker state ready"
        );

        Ok(Self {
            pipeline: Arc::new(pipeline),
            cache,
            orchestrator,
        })
    }
}
