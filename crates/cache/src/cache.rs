use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::CacheError;
use crate::key::{fold, TenderKey};
use crate::repository::TenderRepository;

type Snapshot = HashMap<String, HashSet<String>>;

/// Size of a populated cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub sources: usize,
    pub tender_numbers: usize,
}

/// Process-lifetime map of source to known tender numbers.
///
/// The map is published as a whole behind `snapshot` once every source has
/// loaded. Until then readers see nothing, never a partial map. `init_lock`
/// serializes population; per-source results land in a private staging map
/// under its own lock. Lock order is always `init_lock` before the others.
pub struct DedupCache {
    repository: Arc<dyn TenderRepository>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl DedupCache {
    pub fn new(repository: Arc<dyn TenderRepository>) -> Self {
        Self {
            repository,
            snapshot: RwLock::new(None),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Populates the cache unless a previous call already did.
    ///
    /// Safe to call concurrently: exactly one caller queries the repository,
    /// one query per known source, all in flight at once. If any query fails
    /// nothing is published and the error is returned, so the next call
    /// starts a fresh population pass.
    pub async fn ensure_loaded(&self) -> Result<(), CacheError> {
        if self.current().is_some() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().await;
        if self.current().is_some() {
            return Ok(());
        }

        info!("dedup cache is not initialized; populating from repository");
        let staging: Mutex<Snapshot> = Mutex::new(HashMap::new());
        let sources = self.repository.known_sources();
        let loads = sources
            .iter()
            .map(|source| self.load_source(source, &staging));

        if let Err(err) = try_join_all(loads).await {
            error!(error = %err, "failed to populate dedup cache; cache reset");
            return Err(err);
        }

        let populated = staging
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let stats = stats_of(&populated);
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(populated));
        info!(
            sources = stats.sources,
            tender_numbers = stats.tender_numbers,
            "dedup cache populated"
        );
        Ok(())
    }

    async fn load_source(&self, source: &str, staging: &Mutex<Snapshot>) -> Result<(), CacheError> {
        let numbers = self
            .repository
            .list_known_tender_numbers(source)
            .await
            .map_err(|error| CacheError::Population {
                source_name: source.to_string(),
                error,
            })?;

        let set: HashSet<String> = numbers
            .iter()
            .map(|number| fold(number))
            .filter(|number| !number.is_empty())
            .collect();
        let count = set.len();

        staging
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(fold(source))
            .or_default()
            .extend(set);

        info!(source, count, "loaded tender numbers for source");
        Ok(())
    }

    /// Whether `(source, tender_number)` was already ingested.
    ///
    /// Blank inputs and unknown sources are never duplicates. Fails with
    /// [`CacheError::Uninitialized`] before the first successful population.
    pub fn is_duplicate(&self, source: &str, tender_number: &str) -> Result<bool, CacheError> {
        let snapshot = self.current().ok_or(CacheError::Uninitialized)?;
        let Some(key) = TenderKey::new(source, tender_number) else {
            return Ok(false);
        };
        Ok(contains(&snapshot, &key))
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Counts of the populated cache, `None` before population.
    pub fn stats(&self) -> Option<CacheStats> {
        self.current().map(|snapshot| stats_of(&snapshot))
    }
}

fn contains(snapshot: &Snapshot, key: &TenderKey) -> bool {
    snapshot
        .get(key.folded_source())
        .is_some_and(|numbers| numbers.contains(key.folded_number()))
}

fn stats_of(snapshot: &Snapshot) -> CacheStats {
    CacheStats {
        sources: snapshot.len(),
        tender_numbers: snapshot.values().map(HashSet::len).sum(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::repository::InMemoryRepository;

    fn seeded() -> Arc<InMemoryRepository> {
        Arc::new(
            InMemoryRepository::new()
                .with_source("SARS", ["RFQ-001", "rfq-002"])
                .with_source("Eskom", ["E/2025/7"]),
        )
    }

    #[tokio::test]
    async fn lookup_before_population_is_uninitialized() {
        let cache = DedupCache::new(seeded());
        assert_eq!(
            cache.is_duplicate("SARS", "RFQ-001"),
            Err(CacheError::Uninitialized)
        );
        assert!(!cache.is_loaded());
        assert_eq!(cache.stats(), None);
    }

    #[tokio::test]
    async fn loaded_pairs_match_regardless_of_case() {
        let cache = DedupCache::new(seeded());
        cache.ensure_loaded().await.expect("population succeeds");

        assert_eq!(cache.is_duplicate("sars", "rfq-001"), Ok(true));
        assert_eq!(cache.is_duplicate("SARS", "RFQ-002"), Ok(true));
        assert_eq!(cache.is_duplicate("ESKOM", "e/2025/7"), Ok(true));
        assert_eq!(cache.is_duplicate("SARS", "RFQ-999"), Ok(false));
        assert_eq!(cache.is_duplicate("Transnet", "RFQ-001"), Ok(false));
        assert_eq!(cache.is_duplicate("", "RFQ-001"), Ok(false));
        assert_eq!(cache.is_duplicate("SARS", "   "), Ok(false));
        assert_eq!(
            cache.stats(),
            Some(CacheStats {
                sources: 2,
                tender_numbers: 3
            })
        );
    }

    #[tokio::test]
    async fn repeated_and_concurrent_loads_query_once() {
        let repo = Arc::new(
            InMemoryRepository::new()
                .with_source("SARS", ["RFQ-001"])
                .with_source("eTenders", ["ET-1"])
                .with_latency(Duration::from_millis(20)),
        );
        let cache = Arc::new(DedupCache::new(repo.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.ensure_loaded().await })
            })
            .collect();
        for handle in handles {
            let Ok(result) = handle.await else {
                panic!("task panicked");
            };
            assert!(result.is_ok());
        }
        cache.ensure_loaded().await.expect("already loaded");

        assert_eq!(repo.calls("SARS"), 1);
        assert_eq!(repo.calls("eTenders"), 1);
        assert_eq!(repo.total_calls(), 2);
    }

    #[tokio::test]
    async fn failed_source_discards_population_and_retries() {
        let repo = seeded();
        repo.fail_source("Eskom");
        let cache = DedupCache::new(repo.clone());

        let err = cache.ensure_loaded().await;
        assert!(matches!(
            err,
            Err(CacheError::Population { ref source_name, .. }) if source_name == "Eskom"
        ));
        assert!(!cache.is_loaded());
        assert_eq!(
            cache.is_duplicate("SARS", "RFQ-001"),
            Err(CacheError::Uninitialized)
        );

        repo.clear_failures();
        cache.ensure_loaded().await.expect("retry succeeds");
        assert_eq!(cache.is_duplicate("SARS", "RFQ-001"), Ok(true));
        // the failed pass may stop before querying every source
        assert_eq!(repo.calls("Eskom"), 2);
        assert!(repo.calls("SARS") >= 1);
    }

    #[tokio::test]
    async fn empty_repository_still_counts_as_loaded() {
        let cache = DedupCache::new(Arc::new(InMemoryRepository::new()));
        cache.ensure_loaded().await.expect("population succeeds");
        assert!(cache.is_loaded());
        assert_eq!(cache.is_duplicate("SARS", "RFQ-001"), Ok(false));
    }
}
