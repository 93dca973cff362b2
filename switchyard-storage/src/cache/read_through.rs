//! Read-through cache for bulk preference reads.
//!
//! On a hit the stored snapshot is returned without touching the repository.
//! On a miss the caller's `compute` future runs, its result is stored and
//! returned. Concurrent misses for the same key are collapsed so that only
//! one of them computes.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use switchyard_core::{CacheSettings, StorageError, SwitchyardResult};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use super::key::CacheKey;
use super::read::{age_at, CacheRead};
use super::traits::{CacheBackend, CachedValue};

type Gate = Arc<AsyncMutex<()>>;

/// Read-through cache over a [`CacheBackend`].
///
/// # Example
///
/// ```ignore
/// let cache = ReadThroughCache::new(Arc::new(InMemoryCacheBackend::new()), settings);
///
/// let key = cache.key_all_names();
/// let names = cache
///     .fetch_or_compute(&key, || async { repo.list_names().await })
///     .await?;
/// assert!(names.was_cache_miss());
/// ```
pub struct ReadThroughCache<C: CacheBackend> {
    cache: Arc<C>,
    settings: CacheSettings,
    /// One async gate per key with a compute in flight.
    in_flight: Arc<Mutex<HashMap<String, Gate>>>,
    /// Bumped by every invalidation. A fill that started under an older
    /// generation does not leave its result in the backend.
    generation: Arc<AtomicU64>,
}

impl<C: CacheBackend> Clone for ReadThroughCache<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            settings: self.settings.clone(),
            in_flight: Arc::clone(&self.in_flight),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<C: CacheBackend> ReadThroughCache<C> {
    pub fn new(cache: Arc<C>, settings: CacheSettings) -> Self {
        Self {
            cache,
            settings,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get the cache settings.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Get a reference to the cache backend.
    pub fn backend(&self) -> &C {
        &self.cache
    }

    /// Key for the all-names listing in this cache's namespace.
    pub fn key_all_names(&self) -> CacheKey {
        CacheKey::all_names(&self.settings.namespace)
    }

    /// Key for a bulk lookup of `names` in this cache's namespace.
    pub fn key_by_names(&self, names: &BTreeSet<String>) -> CacheKey {
        CacheKey::by_names(&self.settings.namespace, names)
    }

    /// Return the cached value for `key`, or run `compute`, store its result
    /// and return it.
    ///
    /// A failed compute is returned to the caller and nothing is stored.
    pub async fn fetch_or_compute<T, F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> SwitchyardResult<CacheRead<T>>
    where
        T: CachedValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = SwitchyardResult<T>>,
    {
        if !self.settings.enabled {
            let value = compute().await?;
            return Ok(CacheRead::from_repository(value, Utc::now()));
        }

        if let Some(hit) = self.lookup::<T>(key).await? {
            debug!(key = %key, "cache hit");
            return Ok(hit);
        }

        let gate = self.gate_for(key)?;
        let guard = gate.lock().await;
        let result = self.fill(key, compute).await;
        drop(guard);
        self.release_gate(key, gate);
        result
    }

    /// Drop the entry for `key`.
    pub async fn invalidate(&self, key: &CacheKey) -> SwitchyardResult<bool> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let removed = self.cache.delete(key).await?;
        debug!(key = %key, removed, "cache invalidated");
        Ok(removed)
    }

    /// Drop every entry in the backend.
    pub async fn invalidate_all(&self) -> SwitchyardResult<u64> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let removed = self.cache.clear().await?;
        debug!(removed, "cache cleared");
        Ok(removed)
    }

    /// Runs under the key's gate. A waiter that queued behind another
    /// compute finds the stored value here and skips its own.
    async fn fill<T, F, Fut>(&self, key: &CacheKey, compute: F) -> SwitchyardResult<CacheRead<T>>
    where
        T: CachedValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = SwitchyardResult<T>>,
    {
        if let Some(hit) = self.lookup::<T>(key).await? {
            debug!(key = %key, "cache hit after waiting on in-flight compute");
            return Ok(hit);
        }

        debug!(key = %key, "cache miss");
        let generation = self.generation.load(Ordering::Acquire);
        let value = compute().await?;
        let read = CacheRead::from_repository(value, Utc::now());

        if self.generation.load(Ordering::Acquire) != generation {
            debug!(key = %key, "invalidated during compute, result not stored");
            return Ok(read);
        }

        self.cache.put(key, read.value(), read.cached_at()).await?;

        // An invalidation that ran while the put was in progress may have
        // deleted before the entry landed. Drop the entry so it cannot outlive
        // that invalidation.
        if self.generation.load(Ordering::Acquire) != generation {
            self.cache.delete(key).await?;
            debug!(key = %key, "invalidated during store, entry dropped");
        }

        Ok(read)
    }

    async fn lookup<T: CachedValue>(&self, key: &CacheKey) -> SwitchyardResult<Option<CacheRead<T>>> {
        let Some((value, cached_at)) = self.cache.get::<T>(key).await? else {
            return Ok(None);
        };

        if let Some(ttl) = self.settings.entry_ttl {
            if age_at(cached_at, Utc::now()) > ttl {
                debug!(key = %key, "cache entry expired");
                return Ok(None);
            }
        }

        Ok(Some(CacheRead::from_cache(value, cached_at)))
    }

    fn gate_for(&self, key: &CacheKey) -> SwitchyardResult<Gate> {
        let mut in_flight = self.in_flight.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(Arc::clone(in_flight.entry(key.encode()).or_default()))
    }

    /// Forget the gate once nobody else holds or waits on it.
    fn release_gate(&self, key: &CacheKey, gate: Gate) {
        let Ok(mut in_flight) = self.in_flight.lock() else {
            return;
        };
        let encoded = key.encode();
        let ours = in_flight
            .get(&encoded)
            .is_some_and(|current| Arc::ptr_eq(current, &gate));
        // One reference in the map, one here.
        if ours && Arc::strong_count(&gate) <= 2 {
            in_flight.remove(&encoded);
        }
    }

    #[cfg(test)]
    pub(crate) fn in_flight_len(&self) -> usize {
        self.in_flight.lock().map(|m| m.len()).unwrap_or(0)
    }
}
