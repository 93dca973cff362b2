//! Values returned by the read-through cache, tagged with where they came
//! from.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Where a [`CacheRead`] was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// A stored snapshot.
    Cache,
    /// A fresh repository read (cache miss, expired entry or cache disabled).
    Repository,
}

/// A value plus the instant it was captured and its [`ReadSource`].
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    cached_at: DateTime<Utc>,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at,
            source: ReadSource::Cache,
        }
    }

    /// A value just read from the repository, captured at `read_at`.
    pub fn from_repository(value: T, read_at: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at: read_at,
            source: ReadSource::Repository,
        }
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == ReadSource::Cache
    }

    pub fn was_cache_miss(&self) -> bool {
        self.source == ReadSource::Repository
    }

    /// When the value was captured from the repository.
    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    /// How old the value is, measured against the wall clock.
    pub fn staleness(&self) -> Duration {
        age_at(self.cached_at, Utc::now())
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Time from `captured` to `now`, zero when `captured` lies in the future.
pub(crate) fn age_at(captured: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(captured)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
