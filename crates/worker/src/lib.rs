//! Queue worker for the tender deduplication pipeline.
//!
//! Reads tender notifications from SQS, routes unique tenders to the AI queue
//! and duplicates or rejected payloads to the duplicate queue, and deletes
//! every handled message from the source queue.
//!
//! # Configuration
//!
//! | Variable | Required | Meaning |
//! |---|---|---|
//! | `SOURCE_QUEUE_URL` | yes | queue notifications arrive on |
//! | `AI_QUEUE_URL` | yes | destination for unique tenders |
//! | `DUPLICATE_QUEUE_URL` | yes | destination for duplicates and rejects |
//! | `DB_CONNECTION_STRING` | yes | PostgreSQL URL of the tender database |
//! | `PIPELINE_CONFIG` | no | path to the pipeline YAML |
//! | `LOG_LEVEL` | no | tracing filter, default `info` |
//! | `INVOCATION_BUDGET_SECS` | no | wall-clock budget, default 900 |
//! | `DB_MAX_CONNECTIONS` | no | pool size, default 5 |
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use worker::WorkerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WorkerConfig::load()?;
//!     let summary = worker::start_worker(config).await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod runner;
pub mod sqs;
pub mod state;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use orchestrator::{Deadline, InvocationSummary, Orchestrator, PollConfig, RemainingTime};
pub use runner::start_worker;
pub use sqs::SqsTransport;
pub use state::WorkerState;
