//! Switchyard Storage - Repository Trait, Read-Through Cache and Store Facade
//!
//! Defines the persistence boundary for preferences, an in-memory
//! implementation of it, the cache used for bulk reads, and the
//! [`PreferenceStore`] that ties them to the activation engine.

pub mod cache;
pub mod dispatch;
pub mod store;

pub use cache::{
    CacheBackend, CacheKey, CacheRead, CacheStats, CachedValue, InMemoryCacheBackend,
    LmdbCacheBackend, LmdbCacheError, QueryShape, ReadThroughCache,
};
pub use dispatch::{OpOutcome, PreferenceOp};
pub use store::PreferenceStore;

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use switchyard_core::{Preference, PreferenceId, StorageError, SwitchyardResult};

// ============================================================================
// REPOSITORY TRAIT
// ============================================================================

/// Durable collection of preferences keyed by name.
///
/// Implementations must enforce name uniqueness on `insert` and on renames
/// through `update`, reporting a violation as [`StorageError::DuplicateName`].
/// Every listing is ordered by name ascending.
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Insert a new preference.
    async fn insert(&self, preference: &Preference) -> SwitchyardResult<()>;

    /// Get a preference by its exact name.
    async fn get_by_name(&self, name: &str) -> SwitchyardResult<Option<Preference>>;

    /// Get every preference whose name is in `names`. Unknown names are
    /// skipped.
    async fn list_by_names(&self, names: &BTreeSet<String>) -> SwitchyardResult<Vec<Preference>>;

    /// Names of every stored preference.
    async fn list_names(&self) -> SwitchyardResult<Vec<String>>;

    /// Every stored preference.
    async fn list_all(&self) -> SwitchyardResult<Vec<Preference>>;

    /// Replace the stored record with the same `preference_id`.
    async fn update(&self, preference: &Preference) -> SwitchyardResult<()>;

    /// Number of stored preferences.
    async fn count(&self) -> SwitchyardResult<usize>;
}

// ============================================================================
// IN-MEMORY REPOSITORY
// ============================================================================

#[derive(Debug, Default)]
struct Records {
    by_name: BTreeMap<String, Preference>,
    names_by_id: HashMap<PreferenceId, String>,
}

/// In-memory repository.
///
/// Uniqueness is checked and the record inserted under one write lock, so of
/// two concurrent inserts for a name exactly one succeeds.
#[derive(Debug, Default)]
pub struct InMemoryPreferenceRepository {
    records: RwLock<Records>,
    reads: AtomicU64,
}

impl InMemoryPreferenceRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read calls served so far. Lets tests tell a cache hit from
    /// a repository round trip.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of stored preferences.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.by_name.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every stored preference.
    pub fn clear(&self) -> SwitchyardResult<()> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        records.by_name.clear();
        records.names_by_id.clear();
        Ok(())
    }

    fn count_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryPreferenceRepository {
    async fn insert(&self, preference: &Preference) -> SwitchyardResult<()> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        if records.by_name.contains_key(&preference.name) {
            return Err(StorageError::DuplicateName {
                name: preference.name.clone(),
            }
            .into());
        }
        if records.names_by_id.contains_key(&preference.preference_id) {
            return Err(StorageError::Backend {
                reason: format!("preference id {} already exists", preference.preference_id),
            }
            .into());
        }
        records
            .names_by_id
            .insert(preference.preference_id, preference.name.clone());
        records
            .by_name
            .insert(preference.name.clone(), preference.clone());
        Ok(())
    }

    async fn get_by_name(&self, name: &str) -> SwitchyardResult<Option<Preference>> {
        self.count_read();
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.by_name.get(name).cloned())
    }

    async fn list_by_names(&self, names: &BTreeSet<String>) -> SwitchyardResult<Vec<Preference>> {
        self.count_read();
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        // Both sides are sorted, so the result comes out in name order.
        Ok(names
            .iter()
            .filter_map(|name| records.by_name.get(name).cloned())
            .collect())
    }

    async fn list_names(&self) -> SwitchyardResult<Vec<String>> {
        self.count_read();
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.by_name.keys().cloned().collect())
    }

    async fn list_all(&self) -> SwitchyardResult<Vec<Preference>> {
        self.count_read();
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.by_name.values().cloned().collect())
    }

    async fn update(&self, preference: &Preference) -> SwitchyardResult<()> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        let old_name = records
            .names_by_id
            .get(&preference.preference_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                name: preference.name.clone(),
            })?;

        if old_name != preference.name {
            if records.by_name.contains_key(&preference.name) {
                return Err(StorageError::DuplicateName {
                    name: preference.name.clone(),
                }
                .into());
            }
            records.by_name.remove(&old_name);
            records
                .names_by_id
                .insert(preference.preference_id, preference.name.clone());
        }

        records
            .by_name
            .insert(preference.name.clone(), preference.clone());
        Ok(())
    }

    async fn count(&self) -> SwitchyardResult<usize> {
        self.count_read();
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.by_name.len())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::SwitchyardError;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = InMemoryPreferenceRepository::new();
        let pref = Preference::new("Max Photo Size").with_value(5);

        repo.insert(&pref).await.unwrap();
        let retrieved = repo.get_by_name("Max Photo Size").await.unwrap();

        assert_eq!(retrieved, Some(pref));
        assert_eq!(repo.get_by_name("max photo size").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_duplicate_name() {
        let repo = InMemoryPreferenceRepository::new();
        repo.insert(&Preference::new("Zebra Color")).await.unwrap();

        let err = repo.insert(&Preference::new("Zebra Color")).await.unwrap_err();
        assert_eq!(
            err,
            SwitchyardError::Storage(StorageError::DuplicateName {
                name: "Zebra Color".to_string()
            })
        );
        assert!(err.is_duplicate_name());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_listings_are_name_ordered() {
        let repo = InMemoryPreferenceRepository::new();
        for name in ["Zebra Color", "Antler Size Maximum", "Preferred shape of cheese"] {
            repo.insert(&Preference::new(name)).await.unwrap();
        }

        assert_eq!(
            repo.list_names().await.unwrap(),
            vec!["Antler Size Maximum", "Preferred shape of cheese", "Zebra Color"]
        );
        let all: Vec<String> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(all, vec!["Antler Size Maximum", "Preferred shape of cheese", "Zebra Color"]);
    }

    #[tokio::test]
    async fn test_list_by_names_skips_unknown() {
        let repo = InMemoryPreferenceRepository::new();
        for name in ["a", "b", "c"] {
            repo.insert(&Preference::new(name)).await.unwrap();
        }

        let found: Vec<String> = repo
            .list_by_names(&set(&["c", "nope", "a"]))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(found, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let repo = InMemoryPreferenceRepository::new();
        let mut pref = Preference::new("Site Name");
        repo.insert(&pref).await.unwrap();

        pref.enabled = true;
        pref.value = "Best Ever Website".into();
        repo.update(&pref).await.unwrap();

        let stored = repo.get_by_name("Site Name").await.unwrap().unwrap();
        assert!(stored.enabled);
        assert_eq!(stored.value.as_str(), Some("Best Ever Website"));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_rename() {
        let repo = InMemoryPreferenceRepository::new();
        let mut pref = Preference::new("Old Name");
        repo.insert(&pref).await.unwrap();

        pref.name = "New Name".to_string();
        repo.update(&pref).await.unwrap();

        assert!(repo.get_by_name("Old Name").await.unwrap().is_none());
        assert!(repo.get_by_name("New Name").await.unwrap().is_some());
        assert_eq!(repo.list_names().await.unwrap(), vec!["New Name"]);
    }

    #[tokio::test]
    async fn test_update_rename_conflict() {
        let repo = InMemoryPreferenceRepository::new();
        let mut first = Preference::new("First");
        repo.insert(&first).await.unwrap();
        repo.insert(&Preference::new("Second")).await.unwrap();

        first.name = "Second".to_string();
        let err = repo.update(&first).await.unwrap_err();
        assert!(err.is_duplicate_name());
        assert!(repo.get_by_name("First").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = InMemoryPreferenceRepository::new();
        let err = repo.update(&Preference::new("Ghost")).await.unwrap_err();
        assert_eq!(
            err,
            SwitchyardError::Storage(StorageError::NotFound {
                name: "Ghost".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_reads_are_counted() {
        let repo = InMemoryPreferenceRepository::new();
        repo.insert(&Preference::new("a")).await.unwrap();
        assert_eq!(repo.reads(), 0);

        repo.get_by_name("a").await.unwrap();
        repo.list_names().await.unwrap();
        repo.list_by_names(&set(&["a"])).await.unwrap();
        assert_eq!(repo.reads(), 3);
    }

    #[tokio::test]
    async fn test_clear() {
        let repo = InMemoryPreferenceRepository::new();
        repo.insert(&Preference::new("a")).await.unwrap();
        repo.clear().unwrap();
        assert!(repo.is_empty());
        repo.insert(&Preference::new("a")).await.unwrap();
    }
}
