//! Disk-backed LRU cache with per-entry TTL.
//!
//! Entries live in an in-memory LRU and are mirrored to one JSON file per key,
//! so a restarted process can reuse resolutions fetched by a previous run.
//! Expired entries are ignored both in memory and on disk.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default in-memory capacity.
const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Directory holding one JSON file per entry.
    pub directory: PathBuf,
    /// Maximum number of entries kept in memory.
    pub capacity: usize,
    /// Lifetime of an entry.
    pub ttl: Duration,
}

impl CacheOptions {
    /// Options with the default capacity.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            directory: directory.into(),
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry<T> {
    key: String,
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn is_live(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Lookups answered from memory.
    pub hits: u64,
    /// Lookups answered from disk.
    pub disk_hits: u64,
    /// Lookups with no live entry.
    pub misses: u64,
    /// Number of entries written.
    pub additions: u64,
}

impl CacheStats {
    /// Calculate hit rate (memory and disk) as a percentage.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits + self.disk_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = (hits as f64 / total as f64) * 100.0;
            rate
        }
    }
}

/// LRU cache mirrored to disk.
pub struct DiskBackedCache<T> {
    options: CacheOptions,
    inner: Mutex<LruCache<String, CacheEntry<T>>>,
    stats: Mutex<CacheStats>,
}

impl<T> DiskBackedCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// Open a cache, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(options: CacheOptions) -> Result<Self> {
        tokio::fs::create_dir_all(&options.directory).await?;
        let cap = NonZeroUsize::new(options.capacity).unwrap_or(NonZeroUsize::MIN);
        debug!(
            "Opened response cache at {} (capacity={}, ttl={}s)",
            options.directory.display(),
            cap,
            options.ttl.as_secs()
        );
        Ok(Self {
            options,
            inner: Mutex::new(LruCache::new(cap)),
            stats: Mutex::new(CacheStats::default()),
        })
    }

    fn file_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.options
            .directory
            .join(format!("{}.json", hex::encode(digest)))
    }

    /// Look up a live entry, falling back to disk on a memory miss.
    ///
    /// Unreadable files are logged and treated as misses.
    pub async fn get(&self, key: &str) -> Option<T> {
        {
            let mut cache = self.inner.lock();
            if let Some(entry) = cache.get(key) {
                if entry.is_live() {
                    let value = entry.value.clone();
                    drop(cache);
                    self.stats.lock().hits += 1;
                    return Some(value);
                }
                cache.pop(key);
            }
        }

        match self.read_file(key).await {
            Ok(Some(entry)) if entry.is_live() && entry.key == key => {
                let value = entry.value.clone();
                self.inner.lock().put(key.to_string(), entry);
                self.stats.lock().disk_hits += 1;
                return Some(value);
            }
            Ok(_) => {}
            Err(e) => warn!("Cache read failed for {key}: {e}"),
        }

        self.stats.lock().misses += 1;
        None
    }

    async fn read_file(&self, key: &str) -> Result<Option<CacheEntry<T>>> {
        let path = self.file_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Store `value` under `key` in memory and on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written to disk. The in-memory
    /// entry is kept either way.
    pub async fn set(&self, key: &str, value: T) -> Result<()> {
        let ttl = chrono::Duration::from_std(self.options.ttl)
            .map_err(|e| Error::Cache(format!("TTL out of range: {e}")))?;
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            expires_at: Utc::now() + ttl,
        };
        let bytes = serde_json::to_vec(&entry)?;

        self.inner.lock().put(key.to_string(), entry);
        self.stats.lock().additions += 1;

        tokio::fs::write(self.file_for(key), bytes).await?;
        Ok(())
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Number of entries currently held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the in-memory cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Directory backing this cache.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.options.directory
    }
}
