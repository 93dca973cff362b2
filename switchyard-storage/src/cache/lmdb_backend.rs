//! Cache entries kept in an LMDB environment through `heed`.
//!
//! The environment is a memory-mapped file, so cached listings survive a
//! restart and can be shared between processes on the same host.
//!
//! Entry layout: `[cached_at: i64 millis, little endian][json value]`.
//! Every mutation runs in its own write transaction.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use switchyard_core::{StorageError, SwitchyardError, SwitchyardResult};

use super::key::CacheKey;
use super::traits::{CacheBackend, CacheStats, CachedValue};

const DATABASE_NAME: &str = "preference_cache";
const HEADER_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    #[error("LMDB: {0}")]
    Lmdb(#[from] heed::Error),

    #[error("cache directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
}

impl From<LmdbCacheError> for SwitchyardError {
    fn from(e: LmdbCacheError) -> Self {
        SwitchyardError::Storage(StorageError::Cache {
            reason: e.to_string(),
        })
    }
}

/// [`CacheBackend`] persisted in LMDB.
///
/// ```ignore
/// let backend = LmdbCacheBackend::open("/var/cache/switchyard", 16)?;
/// backend.put(&CacheKey::all_names("preference"), &names, Utc::now()).await?;
/// ```
pub struct LmdbCacheBackend {
    env: Env,
    db: Database<Bytes, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LmdbCacheBackend {
    /// Open (creating if needed) the environment under `dir`, capped at
    /// `map_size_mb` megabytes.
    pub fn open(dir: impl AsRef<Path>, map_size_mb: usize) -> Result<Self, LmdbCacheError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        // SAFETY: the environment is opened once per backend and its files
        // are only written through this handle's transactions.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(dir)?
        };

        let mut wtxn = env.write_txn()?;
        let db = env.create_database(&mut wtxn, Some(DATABASE_NAME))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            db,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    fn read_entry(&self, key: &str) -> Result<Option<Vec<u8>>, LmdbCacheError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.db.get(&rtxn, key.as_bytes())?.map(<[u8]>::to_vec))
    }

    fn write_entry(&self, key: &str, entry: &[u8]) -> Result<(), LmdbCacheError> {
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, key.as_bytes(), entry)?;
        wtxn.commit()?;
        Ok(())
    }

    fn remove_entry(&self, key: &str) -> Result<bool, LmdbCacheError> {
        let mut wtxn = self.env.write_txn()?;
        let removed = self.db.delete(&mut wtxn, key.as_bytes())?;
        wtxn.commit()?;
        Ok(removed)
    }

    fn remove_all(&self) -> Result<u64, LmdbCacheError> {
        let mut wtxn = self.env.write_txn()?;
        let count = self.db.len(&wtxn)?;
        self.db.clear(&mut wtxn)?;
        wtxn.commit()?;
        Ok(count)
    }

    /// Entry count and total key plus value bytes.
    fn usage(&self) -> Result<(u64, u64), LmdbCacheError> {
        let rtxn = self.env.read_txn()?;
        let mut entries = 0u64;
        let mut bytes = 0u64;
        for item in self.db.iter(&rtxn)? {
            let (key, value) = item?;
            entries += 1;
            bytes += (key.len() + value.len()) as u64;
        }
        Ok((entries, bytes))
    }
}

fn encode_entry<T: CachedValue>(value: &T, cached_at: DateTime<Utc>) -> Result<Vec<u8>, LmdbCacheError> {
    let mut entry = cached_at.timestamp_millis().to_le_bytes().to_vec();
    serde_json::to_writer(&mut entry, value).map_err(LmdbCacheError::Encode)?;
    Ok(entry)
}

fn decode_entry<T: CachedValue>(entry: &[u8]) -> Result<(T, DateTime<Utc>), LmdbCacheError> {
    let Some((header, body)) = entry.split_first_chunk::<HEADER_LEN>() else {
        return Err(LmdbCacheError::Corrupt(format!(
            "{} bytes, shorter than the timestamp header",
            entry.len()
        )));
    };

    let millis = i64::from_le_bytes(*header);
    let cached_at = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| LmdbCacheError::Corrupt(format!("timestamp {millis} out of range")))?;
    let value = serde_json::from_slice(body).map_err(|e| LmdbCacheError::Corrupt(e.to_string()))?;

    Ok((value, cached_at))
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    async fn get<T: CachedValue>(&self, key: &CacheKey) -> SwitchyardResult<Option<(T, DateTime<Utc>)>> {
        let Some(entry) = self.read_entry(&key.encode())? else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let decoded = decode_entry(&entry)?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(decoded))
    }

    async fn put<T: CachedValue>(
        &self,
        key: &CacheKey,
        value: &T,
        cached_at: DateTime<Utc>,
    ) -> SwitchyardResult<()> {
        let entry = encode_entry(value, cached_at)?;
        self.write_entry(&key.encode(), &entry)?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> SwitchyardResult<bool> {
        Ok(self.remove_entry(&key.encode())?)
    }

    async fn clear(&self) -> SwitchyardResult<u64> {
        Ok(self.remove_all()?)
    }

    async fn stats(&self) -> SwitchyardResult<CacheStats> {
        let (entry_count, stored_bytes) = self.usage()?;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            stored_bytes,
        })
    }
}
