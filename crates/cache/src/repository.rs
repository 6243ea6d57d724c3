//! Tender repository backends.
//!
//! A [`TenderRepository`] answers one question: which tender numbers have already
//! been ingested for a given source. The cache calls it once per known source
//! during population and never again for the lifetime of the process.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::key::fold;

/// Read access to previously ingested tender numbers.
#[async_trait]
pub trait TenderRepository: Send + Sync {
    /// Source names this repository can be queried for.
    fn known_sources(&self) -> Vec<String>;

    /// Every stored tender number for `source`.
    async fn list_known_tender_numbers(&self, source: &str)
        -> Result<Vec<String>, RepositoryError>;
}

/// A repository backed by a seeded in-process map.
///
/// Counts calls per source and can be told to fail specific sources, which
/// makes it the backend of choice for tests and local runs.
pub struct InMemoryRepository {
    tenders: BTreeMap<String, Vec<String>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
    latency: Option<Duration>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            tenders: BTreeMap::new(),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            latency: None,
        }
    }

    /// Registers `source` with the given tender numbers.
    pub fn with_source<I, S>(mut self, source: impl Into<String>, numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tenders
            .insert(source.into(), numbers.into_iter().map(Into::into).collect());
        self
    }

    /// Delays every query, so concurrent population is observable in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes queries for `source` fail until [`Self::clear_failures`] is called.
    pub fn fail_source(&self, source: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(fold(source));
    }

    pub fn clear_failures(&self) {
        self.failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Number of queries issued for `source`.
    pub fn calls(&self, source: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&fold(source))
            .copied()
            .unwrap_or(0)
    }

    /// Number of queries issued across all sources.
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .sum()
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenderRepository for InMemoryRepository {
    fn known_sources(&self) -> Vec<String> {
        self.tenders.keys().cloned().collect()
    }

    async fn list_known_tender_numbers(
        &self,
        source: &str,
    ) -> Result<Vec<String>, RepositoryError> {
        let folded = fold(source);
        {
            let mut calls = self
                .calls
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *calls.entry(folded.clone()).or_insert(0) += 1;
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&folded);
        if failing {
            return Err(RepositoryError::query(source, "injected failure"));
        }

        Ok(self
            .tenders
            .iter()
            .find(|(name, _)| fold(name) == folded)
            .map(|(_, numbers)| numbers.clone())
            .unwrap_or_default())
    }
}

/// Binds a source name to the table holding its tenders.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceTable {
    pub source: String,
    pub table: String,
}

impl SourceTable {
    pub fn new(source: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            table: table.into(),
        }
    }
}

/// Column holding the tender number in every source table.
pub const DEFAULT_TENDER_NUMBER_COLUMN: &str = "TenderNumber";

/// The five sources of the production deployment.
pub fn default_source_tables() -> Vec<SourceTable> {
    vec![
        SourceTable::new("SARS", "SarsTender"),
        SourceTable::new("eTenders", "eTender"),
        SourceTable::new("Eskom", "EskomTender"),
        SourceTable::new("Transnet", "TransnetTender"),
        SourceTable::new("SANRAL", "SanralTender"),
    ]
}

/// Checks that `ident` is safe to splice into SQL as a quoted identifier.
pub fn validate_identifier(ident: &str) -> Result<(), RepositoryError> {
    let mut chars = ident.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RepositoryError::InvalidConfig(format!(
            "'{ident}' is not a valid SQL identifier"
        )))
    }
}

#[cfg(feature = "backend-postgres")]
pub use postgres::PostgresRepository;

#[cfg(feature = "backend-postgres")]
mod postgres {
    use async_trait::async_trait;
    use sqlx::postgres::{PgPool, PgPoolOptions};
    use tracing::debug;

    use super::{validate_identifier, SourceTable, TenderRepository};
    use crate::error::RepositoryError;
    use crate::key::fold;

    /// Repository reading tender numbers from PostgreSQL.
    ///
    /// Each call acquires its own pooled connection, so the per-source queries
    /// issued during population run on separate sessions.
    #[derive(Debug, Clone)]
    pub struct PostgresRepository {
        pool: PgPool,
        tables: Vec<SourceTable>,
        column: String,
    }

    impl PostgresRepository {
        /// Creates a lazily connecting pool for `url`.
        ///
        /// No connection is opened until the first query.
        pub fn connect_lazy(
            url: &str,
            max_connections: u32,
            tables: Vec<SourceTable>,
            column: &str,
        ) -> Result<Self, RepositoryError> {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .connect_lazy(url)
                .map_err(|err| RepositoryError::Connection(err.to_string()))?;
            Self::with_column(pool, tables, column)
        }

        /// Wraps an existing pool, reading tender numbers from `column`.
        pub fn with_column(
            pool: PgPool,
            tables: Vec<SourceTable>,
            column: &str,
        ) -> Result<Self, RepositoryError> {
            validate_identifier(column)?;
            for entry in &tables {
                validate_identifier(&entry.table)?;
                if entry.source.trim().is_empty() {
                    return Err(RepositoryError::InvalidConfig(format!(
                        "table '{}' is bound to a blank source name",
                        entry.table
                    )));
                }
            }
            Ok(Self {
                pool,
                tables,
                column: column.to_string(),
            })
        }

        fn table_for(&self, source: &str) -> Option<&str> {
            let folded = fold(source);
            self.tables
                .iter()
                .find(|entry| fold(&entry.source) == folded)
                .map(|entry| entry.table.as_str())
        }
    }

    #[async_trait]
    impl TenderRepository for PostgresRepository {
        fn known_sources(&self) -> Vec<String> {
            self.tables.iter().map(|entry| entry.source.clone()).collect()
        }

        async fn list_known_tender_numbers(
            &self,
            source: &str,
        ) -> Result<Vec<String>, RepositoryError> {
            let Some(table) = self.table_for(source) else {
                return Err(RepositoryError::InvalidConfig(format!(
                    "no table configured for source '{source}'"
                )));
            };

            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| RepositoryError::Connection(err.to_string()))?;

            let sql = format!("SELECT \"{}\" FROM \"{}\"", self.column, table);
            debug!(source, table, "querying known tender numbers");
            let rows: Vec<(Option<String>,)> = sqlx::query_as(&sql)
                .fetch_all(&mut *conn)
                .await
                .map_err(|err| RepositoryError::query(source, err.to_string()))?;

            Ok(rows
                .into_iter()
                .filter_map(|(number,)| number)
                .filter(|number| !number.trim().is_empty())
                .collect())
        }
    }
}
