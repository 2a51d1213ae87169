//! Memoized binary enumeration
//!
//! [`BinaryCache`] answers "which binaries are visible from this directory".
//! Results are persisted under the cache directory and reused by later
//! invocations until [`BinaryCache::invalidate_all`] runs.
//!
//! Concurrency:
//! - within a process, each key has a single `OnceCell`; concurrent lookups
//!   await the same computation
//! - across processes, a per-key advisory lock is held while computing, and
//!   the record is re-read after the lock is acquired

use crate::cache::entry::{
    entry_path, guarded_entry, is_entry_file, lock_path, owning_lock, CacheEntry,
};
use crate::cache::lock::CacheLock;
use crate::error::{LightrunError, LightrunResult};
use crate::project::{AccessibleBinaryMap, BinaryEnumerator};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// Behaviour switches for a cache instance
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Read and write records on disk
    pub persist: bool,
    /// How long to wait for another process computing the same key
    pub lock_timeout: Duration,
    /// Show a spinner while enumerating
    pub show_progress: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            persist: true,
            lock_timeout: Duration::from_secs(30),
            show_progress: false,
        }
    }
}

type Slot = Arc<OnceCell<AccessibleBinaryMap>>;

/// Persisted, memoizing cache of accessible binaries per workspace directory
pub struct BinaryCache {
    dir: PathBuf,
    enumerator: Arc<dyn BinaryEnumerator>,
    options: CacheOptions,
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl BinaryCache {
    /// Open the cache rooted at `dir`
    pub async fn open(
        dir: impl Into<PathBuf>,
        enumerator: Arc<dyn BinaryEnumerator>,
        options: CacheOptions,
    ) -> LightrunResult<Self> {
        let dir = dir.into();
        if options.persist {
            fs::create_dir_all(&dir).await.map_err(|e| {
                LightrunError::io(format!("creating cache directory {}", dir.display()), e)
            })?;
        }
        debug!("Opened binary cache at {}", dir.display());

        Ok(Self {
            dir,
            enumerator,
            options,
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Close the cache, dropping in-memory state
    pub async fn close(self) -> LightrunResult<()> {
        let slots = self.slots.lock().await.len();
        debug!("Closing binary cache ({} keys resolved)", slots);
        Ok(())
    }

    /// Cache namespace directory
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Binaries accessible from `directory`
    pub async fn lookup(&self, directory: &Path) -> LightrunResult<AccessibleBinaryMap> {
        let key = fs::canonicalize(directory).await.map_err(|e| {
            LightrunError::io(format!("canonicalizing {}", directory.display()), e)
        })?;

        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key.clone()).or_default().clone()
        };

        let value = slot
            .get_or_try_init(|| self.load_or_compute(&key))
            .await?;
        Ok(value.clone())
    }

    /// Drop every entry, in memory and on disk
    ///
    /// Each record is removed under its key's lock, so a process still
    /// computing from the old dependency graph finishes before its result is
    /// deleted. Lock files go with their records.
    pub async fn invalidate_all(&self) -> LightrunResult<usize> {
        self.slots.lock().await.clear();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(LightrunError::io("reading cache directory", e)),
        };

        let mut locks = BTreeSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LightrunError::io("reading cache entry", e))?
        {
            if let Some(lock) = owning_lock(&entry.path()) {
                locks.insert(lock);
            }
        }

        let mut removed = 0;
        for lock_file in locks {
            let lock = CacheLock::acquire(&lock_file, self.options.lock_timeout).await?;

            let record = guarded_entry(&lock_file);
            match fs::remove_file(&record).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(LightrunError::io(
                        format!("removing cache file {}", record.display()),
                        e,
                    ))
                }
            }

            if let Err(e) = lock.remove() {
                warn!("Failed to remove cache lock {}: {}", lock_file.display(), e);
            }
        }

        info!("Invalidated {} cache entries", removed);
        Ok(removed)
    }

    /// Every valid persisted record, ordered by key
    pub async fn entries(&self) -> LightrunResult<Vec<CacheEntry>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(LightrunError::io("reading cache directory", e)),
        };

        let mut records = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LightrunError::io("reading cache entry", e))?
        {
            let path = entry.path();
            if !is_entry_file(&path) {
                continue;
            }
            if let Ok(content) = fs::read_to_string(&path).await {
                if let Some(record) = CacheEntry::decode(&content) {
                    records.push(record);
                }
            }
        }

        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn load_or_compute(&self, key: &Path) -> LightrunResult<AccessibleBinaryMap> {
        if !self.options.persist {
            return self.compute(key).await;
        }

        let path = entry_path(&self.dir, key);
        if let Some(entry) = CacheEntry::read(&path, key).await {
            debug!("Cache hit for {}", key.display());
            return Ok(entry.value);
        }

        let _lock = CacheLock::acquire(&lock_path(&self.dir, key), self.options.lock_timeout).await?;

        // Another process may have finished while we waited
        if let Some(entry) = CacheEntry::read(&path, key).await {
            debug!("Cache filled by another process for {}", key.display());
            return Ok(entry.value);
        }

        debug!("Cache miss for {}", key.display());
        let value = self.compute(key).await?;

        if let Err(e) = CacheEntry::new(key, value.clone()).write(&path).await {
            warn!("Failed to persist binary cache: {}", e);
        }

        Ok(value)
    }

    async fn compute(&self, key: &Path) -> LightrunResult<AccessibleBinaryMap> {
        let spinner = self.options.show_progress.then(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                pb.set_style(style);
            }
            pb.set_message("Collecting workspace binaries...");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let result = self.enumerator.enumerate(key).await;

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        result
    }
}
