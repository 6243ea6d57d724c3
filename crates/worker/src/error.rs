use cache::{CacheError, RepositoryError};
use router::RouterError;
use tender_dedup::ConfigLoadError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Worker error types
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// A required setting is missing or unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Pipeline config error: {0}")]
    PipelineConfig(#[from] ConfigLoadError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Routing error: {0}")]
    Router(#[from] RouterError),
}
