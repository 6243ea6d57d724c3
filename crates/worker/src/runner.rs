use crate::config::WorkerConfig;
use crate::orchestrator::{Deadline, InvocationSummary};
use crate::state::WorkerState;

/// Run one worker invocation against the configured queues.
///
/// Sets up JSON logging at the configured level, installs the metrics bridge,
/// wires the shared state and drains the source queue until it is empty or
/// the invocation budget runs down to the safety margin.
pub async fn start_worker(config: WorkerConfig) -> anyhow::Result<InvocationSummary> {
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .init();

    crate::metrics::install();

    let budget = config.invocation_budget();
    let deadline = Deadline::after(budget);
    let state = WorkerState::build(config).await?;

    tracing::info!(
        budget_secs = budget.as_secs(),
        safety_margin_secs = state.pipeline.poll.safety_margin_secs,
        "starting tender worker"
    );

    let summary = state.orchestrator.invoke(Vec::new(), &deadline).await?;
    if let Some(stats) = state.cache.stats() {
        tracing::info!(
            sources = stats.sources,
            tender_numbers = stats.tender_numbers,
            "dedup cache in use"
        );
    }
    Ok(summary)
}
