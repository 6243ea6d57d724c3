use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tender_dedup::PipelineConfig;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration, read from environment variables.
///
/// Endpoint and secret settings are required; everything else has a default.
/// Pipeline tunables live in the optional YAML file named by `PIPELINE_CONFIG`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Queue the notifications arrive on (`SOURCE_QUEUE_URL`)
    #[serde(default)]
    pub source_queue_url: String,

    /// Destination for unique tenders (`AI_QUEUE_URL`)
    #[serde(default)]
    pub ai_queue_url: String,

    /// Destination for duplicates and rejected payloads (`DUPLICATE_QUEUE_URL`)
    #[serde(default)]
    pub duplicate_queue_url: String,

    /// Tender database connection string (`DB_CONNECTION_STRING`)
    #[serde(default)]
    pub db_connection_string: String,

    /// Path to the pipeline YAML file
    #[serde(default)]
    pub pipeline_config: Option<PathBuf>,

    /// Log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Wall-clock budget for one invocation in seconds
    #[serde(default = "default_invocation_budget_secs")]
    pub invocation_budget_secs: u64,

    /// Pool size for the tender database
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            source_queue_url: String::new(),
            ai_queue_url: String::new(),
            duplicate_queue_url: String::new(),
            db_connection_string: String::new(),
            pipeline_config: None,
            log_level: default_log_level(),
            invocation_budget_secs: default_invocation_budget_secs(),
            db_max_connections: default_db_max_connections(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from the process environment
    pub fn load() -> WorkerResult<Self> {
        Self::from_environment(config::Environment::default())
    }

    /// Load configuration from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> WorkerResult<Self> {
        Self::from_environment(config::Environment::default().source(Some(vars)))
    }

    fn from_environment(env: config::Environment) -> WorkerResult<Self> {
        let config: WorkerConfig = config::Config::builder()
            .add_source(env)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Fails naming the first required variable that is missing or blank
    pub fn validate(&self) -> WorkerResult<()> {
        let required = [
            ("SOURCE_QUEUE_URL", &self.source_queue_url),
            ("AI_QUEUE_URL", &self.ai_queue_url),
            ("DUPLICATE_QUEUE_URL", &self.duplicate_queue_url),
            ("DB_CONNECTION_STRING", &self.db_connection_string),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(WorkerError::Config(format!(
                    "{name} environment variable is required"
                )));
            }
        }
        if self.invocation_budget_secs == 0 {
            return Err(WorkerError::Config(
                "INVOCATION_BUDGET_SECS must be greater than zero".to_string(),
            ));
        }
        if self.db_max_connections == 0 {
            return Err(WorkerError::Config(
                "DB_MAX_CONNECTIONS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The pipeline YAML, or defaults when no file is configured
    pub fn pipeline(&self) -> WorkerResult<PipelineConfig> {
        match &self.pipeline_config {
            Some(path) => Ok(PipelineConfig::from_file(path)?),
            None => Ok(PipelineConfig::default()),
        }
    }

    /// Get the invocation budget as Duration
    pub fn invocation_budget(&self) -> Duration {
        Duration::from_secs(self.invocation_budget_secs)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_invocation_budget_secs() -> u64 {
    900
}

fn default_db_max_connections() -> u32 {
    5
}
