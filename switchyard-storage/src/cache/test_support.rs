//! Backend wrappers for exercising cache interleavings in tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use switchyard_core::SwitchyardResult;
use tokio::sync::Notify;

use super::key::CacheKey;
use super::memory_backend::InMemoryCacheBackend;
use super::traits::{CacheBackend, CacheStats, CachedValue};

/// In-memory backend whose next `put` can be held open, so a test can run
/// other operations while a fill is storing its result.
#[derive(Debug, Default)]
pub(crate) struct PausingCacheBackend {
    inner: InMemoryCacheBackend,
    pause: AtomicBool,
    started: Notify,
    resume: Notify,
}

impl PausingCacheBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inner(&self) -> &InMemoryCacheBackend {
        &self.inner
    }

    /// Hold the next `put` until [`resume_put`](Self::resume_put).
    pub(crate) fn pause_next_put(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    /// Wait until the paused `put` has been entered.
    pub(crate) async fn put_started(&self) {
        self.started.notified().await;
    }

    pub(crate) fn resume_put(&self) {
        self.resume.notify_one();
    }
}

#[async_trait]
impl CacheBackend for PausingCacheBackend {
    async fn get<T: CachedValue>(&self, key: &CacheKey) -> SwitchyardResult<Option<(T, DateTime<Utc>)>> {
        self.inner.get(key).await
    }

    async fn put<T: CachedValue>(
        &self,
        key: &CacheKey,
        value: &T,
        cached_at: DateTime<Utc>,
    ) -> SwitchyardResult<()> {
        if self.pause.swap(false, Ordering::SeqCst) {
            self.started.notify_one();
            self.resume.notified().await;
        }
        self.inner.put(key, value, cached_at).await
    }

    async fn delete(&self, key: &CacheKey) -> SwitchyardResult<bool> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> SwitchyardResult<u64> {
        self.inner.clear().await
    }

    async fn stats(&self) -> SwitchyardResult<CacheStats> {
        self.inner.stats().await
    }
}
