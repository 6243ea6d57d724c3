//! Tender deduplication cache
//!
//! Keeps, for the lifetime of the process, the set of tender numbers already
//! ingested for each known source. The set is loaded lazily from a
//! [`TenderRepository`] on first use and is immutable afterwards.
//!
//! ## Lifecycle
//!
//! 1. A fresh [`DedupCache`] is empty; lookups fail with [`CacheError::Uninitialized`].
//! 2. [`DedupCache::ensure_loaded`] queries every known source concurrently and
//!    publishes the result in one step.
//! 3. If any source fails, nothing is published and a later call retries.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use cache::{DedupCache, InMemoryRepository};
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     let repo = InMemoryRepository::new().with_source("SARS", ["RFQ-001"]);
//!     let cache = DedupCache::new(Arc::new(repo));
//!     cache.ensure_loaded().await.unwrap();
//!     assert!(cache.is_duplicate("sars", "rfq-001").unwrap());
//! });
//! ```
mod cache;
mod error;
mod key;
mod repository;

pub use crate::cache::{CacheStats, DedupCache};
pub use crate::error::{CacheError, RepositoryError};
pub use crate::key::TenderKey;
pub use crate::repository::{
    default_source_tables, validate_identifier, InMemoryRepository, SourceTable,
    TenderRepository, DEFAULT_TENDER_NUMBER_COLUMN,
};

#[cfg(feature = "backend-postgres")]
pub use crate::repository::PostgresRepository;
