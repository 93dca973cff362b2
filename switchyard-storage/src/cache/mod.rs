//! Read-through cache for bulk preference reads.
//!
//! Two query shapes are cached: the listing of every preference name and
//! bulk lookups by a set of names. Everything else goes to the repository.
//!
//! # Snapshots
//!
//! Backends store values serialized, so every read hands back an owned copy
//! of some past state. A caller that wants to mutate a preference must load
//! it uncached through `PreferenceStore::find_by_name`.
//!
//! # Staleness
//!
//! Creating or renaming a preference invalidates the all-names entry.
//! Field changes (enabling, disabling, new values) do not touch bulk
//! entries, so a cached bulk read can show a record as it was before its
//! last save until the entry is invalidated or its TTL runs out.
//!
//! # Example
//!
//! ```ignore
//! let cache = ReadThroughCache::new(Arc::new(InMemoryCacheBackend::new()), settings);
//! let read = cache
//!     .fetch_or_compute(&cache.key_all_names(), || repo.list_names())
//!     .await?;
//!
//! if read.staleness() > Duration::from_secs(30) {
//!     tracing::debug!("serving names cached {:?} ago", read.staleness());
//! }
//! ```

pub mod key;
pub mod lmdb_backend;
pub mod memory_backend;
pub mod read;
pub mod read_through;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use key::{CacheKey, QueryShape};
pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use memory_backend::InMemoryCacheBackend;
pub use read::{CacheRead, ReadSource};
pub use read_through::ReadThroughCache;
pub use traits::{CacheBackend, CacheStats, CachedValue};
