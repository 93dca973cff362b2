//! In-process cache backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use switchyard_core::{StorageError, SwitchyardResult};

use super::key::CacheKey;
use super::traits::{CacheBackend, CacheStats, CachedValue};

/// Cache backend holding serialized entries in a `HashMap`.
///
/// Entries are stored as JSON bytes and swapped in whole under the write
/// lock, so readers never observe a partially written entry.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<String, (Vec<u8>, DateTime<Utc>)>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an entry exists for `key`, without touching hit statistics.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(&key.encode()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get<T: CachedValue>(&self, key: &CacheKey) -> SwitchyardResult<Option<(T, DateTime<Utc>)>> {
        let entry = {
            let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
            entries.get(&key.encode()).cloned()
        };

        match entry {
            Some((bytes, cached_at)) => {
                let value: T = serde_json::from_slice(&bytes).map_err(|e| StorageError::Cache {
                    reason: format!("deserialization failed: {}", e),
                })?;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some((value, cached_at)))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put<T: CachedValue>(
        &self,
        key: &CacheKey,
        value: &T,
        cached_at: DateTime<Utc>,
    ) -> SwitchyardResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| StorageError::Cache {
            reason: format!("serialization failed: {}", e),
        })?;
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.insert(key.encode(), (bytes, cached_at));
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> SwitchyardResult<bool> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.remove(&key.encode()).is_some())
    }

    async fn clear(&self) -> SwitchyardResult<u64> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        let removed = entries.len() as u64;
        entries.clear();
        Ok(removed)
    }

    async fn stats(&self) -> SwitchyardResult<CacheStats> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: entries.len() as u64,
            stored_bytes: entries.iter().map(|(k, (v, _))| (k.len() + v.len()) as u64).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let backend = InMemoryCacheBackend::new();
        let key = CacheKey::all_names("preference");
        let names = vec!["Antler Size Maximum".to_string(), "Zebra Color".to_string()];
        let cached_at = Utc::now();

        backend.put(&key, &names, cached_at).await.unwrap();
        let (got, at): (Vec<String>, _) = backend.get(&key).await.unwrap().unwrap();

        assert_eq!(got, names);
        assert_eq!(at, cached_at);
    }

    #[tokio::test]
    async fn test_miss_and_stats() {
        let backend = InMemoryCacheBackend::new();
        let key = CacheKey::all_names("preference");

        let missing: Option<(Vec<String>, _)> = backend.get(&key).await.unwrap();
        assert!(missing.is_none());

        backend.put(&key, &vec!["a".to_string()], Utc::now()).await.unwrap();
        let _: Option<(Vec<String>, _)> = backend.get(&key).await.unwrap();

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert!(stats.stored_bytes > 0);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let backend = InMemoryCacheBackend::new();
        let all = CacheKey::all_names("preference");
        let some = CacheKey::by_names("preference", ["a"]);

        backend.put(&all, &vec!["a".to_string()], Utc::now()).await.unwrap();
        backend.put(&some, &vec!["a".to_string()], Utc::now()).await.unwrap();

        assert!(backend.delete(&all).await.unwrap());
        assert!(!backend.delete(&all).await.unwrap());
        assert!(backend.contains(&some));

        assert_eq!(backend.clear().await.unwrap(), 1);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_cache_error() {
        let backend = InMemoryCacheBackend::new();
        let key = CacheKey::all_names("preference");
        backend.put(&key, &"not a list".to_string(), Utc::now()).await.unwrap();

        let result: SwitchyardResult<Option<(Vec<String>, _)>> = backend.get(&key).await;
        assert!(matches!(
            result,
            Err(switchyard_core::SwitchyardError::Storage(StorageError::Cache { .. }))
        ));
    }
}
