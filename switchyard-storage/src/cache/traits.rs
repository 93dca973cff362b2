//! The seam between the read-through cache and its storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use switchyard_core::SwitchyardResult;

use super::key::CacheKey;

/// Anything a backend can store: listings of names and preference records.
///
/// Backends keep serialized bytes, so a cached result is a snapshot and
/// every read yields an independent copy.
pub trait CachedValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CachedValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Key/value storage for cached query results.
///
/// A `put` replaces the whole entry; a concurrent `get` observes the old
/// entry or the new one.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// The stored value for `key` and when it was captured.
    async fn get<T: CachedValue>(&self, key: &CacheKey) -> SwitchyardResult<Option<(T, DateTime<Utc>)>>;

    async fn put<T: CachedValue>(
        &self,
        key: &CacheKey,
        value: &T,
        cached_at: DateTime<Utc>,
    ) -> SwitchyardResult<()>;

    /// Returns `true` if an entry was removed.
    async fn delete(&self, key: &CacheKey) -> SwitchyardResult<bool>;

    /// Returns the number of entries removed.
    async fn clear(&self) -> SwitchyardResult<u64>;

    async fn stats(&self) -> SwitchyardResult<CacheStats>;
}

/// Counters reported by a [`CacheBackend`].
///
/// `hits` and `misses` count `get` calls since the backend was created;
/// the other two describe what is stored right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    /// Key plus value bytes across all entries.
    pub stored_bytes: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups that hit, `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}
