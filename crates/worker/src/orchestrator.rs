//! Time-budgeted invocation loop.
//!
//! One invocation: make sure the dedup cache is populated, route the batch the
//! trigger delivered, then keep polling the source queue until it drains or
//! the remaining budget falls to the safety margin.
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use router::{BatchCounters, BatchRouter, QueueTransport, RawMessage, ReceiveOptions};
use serde::{Deserialize, Serialize};
use tender_dedup::PollYamlConfig;
use tracing::{error, info, info_span, Instrument};

use crate::error::WorkerResult;

/// Time left in the current invocation.
pub trait RemainingTime: Send + Sync {
    fn remaining(&self) -> Duration;
}

/// A fixed budget measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }
}

impl RemainingTime for Deadline {
    fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }
}

/// Polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_messages: usize,
    pub wait_time: Duration,
    pub visibility_timeout: Duration,
    /// Stop polling once the remaining time is at or below this.
    pub safety_margin: Duration,
    /// Pause after each non-empty poll.
    pub poll_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from(&PollYamlConfig::default())
    }
}

impl From<&PollYamlConfig> for PollConfig {
    fn from(yaml: &PollYamlConfig) -> Self {
        Self {
            max_messages: yaml.max_messages,
            wait_time: Duration::from_secs(yaml.wait_time_secs),
            visibility_timeout: Duration::from_secs(yaml.visibility_timeout_secs),
            safety_margin: Duration::from_secs(yaml.safety_margin_secs),
            poll_delay: Duration::from_millis(yaml.poll_delay_ms),
        }
    }
}

impl PollConfig {
    fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions {
            max_messages: self.max_messages,
            wait_time: self.wait_time,
            visibility_timeout: self.visibility_timeout,
        }
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationSummary {
    pub batches: u64,
    pub counters: BatchCounters,
    pub deferred: u64,
    pub elapsed: Duration,
}

impl fmt::Display for InvocationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Success. Batches: {}, Total Processed: {}, Duplicates Found: {}, Rejected: {}, Duration: {}ms",
            self.batches,
            self.counters.processed,
            self.counters.duplicates,
            self.counters.rejected,
            self.elapsed.as_millis()
        )
    }
}

/// Drives one invocation over a shared router.
pub struct Orchestrator<T> {
    router: Arc<BatchRouter<T>>,
    poll: PollConfig,
}

impl<T: QueueTransport> Orchestrator<T> {
    pub fn new(router: Arc<BatchRouter<T>>, poll: PollConfig) -> Self {
        Self { router, poll }
    }

    pub fn router(&self) -> &Arc<BatchRouter<T>> {
        &self.router
    }

    /// Runs one invocation.
    ///
    /// Cache population failure, receive failure and send failure all end the
    /// invocation with an error; no partial summary is produced.
    pub async fn invoke(
        &self,
        seed: Vec<RawMessage>,
        clock: &dyn RemainingTime,
    ) -> WorkerResult<InvocationSummary> {
        let span = info_span!("invocation", seed = seed.len());
        let result = self.run(seed, clock).instrument(span).await;
        if let Err(err) = &result {
            error!(error = %err, "invocation failed");
        }
        result
    }

    async fn run(
        &self,
        seed: Vec<RawMessage>,
        clock: &dyn RemainingTime,
    ) -> WorkerResult<InvocationSummary> {
        let started = Instant::now();
        let mut totals = BatchCounters::default();
        let mut batches = 0u64;
        let mut deferred = 0u64;

        info!(initial = seed.len(), "invocation started");
        self.router.cache().ensure_loaded().await?;

        if !seed.is_empty() {
            batches += 1;
            info!(batch = batches, count = seed.len(), "processing initial batch");
            let report = self.router.process_batch(&seed).await?;
            totals += report.counters;
            deferred += report.deferred as u64;
        }

        let source = self.router.queues().source.clone();
        let options = self.poll.receive_options();
        while clock.remaining() > self.poll.safety_margin {
            let messages = self.router.client().receive_batch(&source, &options).await?;
            if messages.is_empty() {
                info!("queue polling complete; no more messages");
                break;
            }

            batches += 1;
            info!(batch = batches, count = messages.len(), "processing polled batch");
            let report = self.router.process_batch(&messages).await?;
            totals += report.counters;
            deferred += report.deferred as u64;

            tokio::time::sleep(self.poll.poll_delay).await;
        }

        let summary = InvocationSummary {
            batches,
            counters: totals,
            deferred,
            elapsed: started.elapsed(),
        };
        info!(result = %summary, "invocation finished");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_matches_format() {
        let summary = InvocationSummary {
            batches: 3,
            counters: BatchCounters {
                processed: 21,
                duplicates: 4,
                rejected: 6,
            },
            deferred: 0,
            elapsed: Duration::from_millis(1534),
        };
        assert_eq!(
            summary.to_string(),
            "Success. Batches: 3, Total Processed: 21, Duplicates Found: 4, Rejected: 6, Duration: 1534ms"
        );
    }

    #[test]
    fn deadline_counts_down_and_saturates() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(deadline.remaining() <= Duration::from_secs(60));
        assert!(deadline.remaining() > Duration::from_secs(59));
        assert_eq!(Deadline::after(Duration::ZERO).remaining(), Duration::ZERO);
    }

    #[test]
    fn poll_defaults_match_yaml_defaults() {
        let poll = PollConfig::default();
        assert_eq!(poll.max_messages, 10);
        assert_eq!(poll.wait_time, Duration::from_secs(2));
        assert_eq!(poll.visibility_timeout, Duration::from_secs(300));
        assert_eq!(poll.safety_margin, Duration::from_secs(30));
        assert_eq!(poll.poll_delay, Duration::from_millis(100));
    }
}
