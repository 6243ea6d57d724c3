use thiserror::Error;

/// Errors produced by a [`crate::TenderRepository`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RepositoryError {
    /// The store could not be reached or no connection could be acquired.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The per-source query failed.
    #[error("query for source '{source_name}' failed: {message}")]
    Query {
        source_name: String,
        message: String,
    },

    /// The repository was configured with an unusable value.
    #[error("invalid repository configuration: {0}")]
    InvalidConfig(String),
}

impl RepositoryError {
    pub fn query(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        RepositoryError::Query {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by [`crate::DedupCache`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CacheError {
    /// A lookup happened before any population pass completed.
    #[error("dedup cache is not initialized; call ensure_loaded first")]
    Uninitialized,

    /// Loading one source failed, so the whole population pass was discarded.
    #[error("failed to load tender numbers for source '{source_name}'")]
    Population {
        source_name: String,
        #[source]
        error: RepositoryError,
    },
}
