//! Persisted cache record
//!
//! One JSON file per workspace directory:
//!
//! ```json
//! { "schema_version": 1, "key": "/repo/packages/app",
//!   "computed_at": "2026-01-01T00:00:00Z", "value": { "eslint": { ... } } }
//! ```
//!
//! Anything that does not decode under the current schema, or whose key does
//! not match the requested directory, is reported as absent so the caller
//! recomputes it.

use crate::error::{LightrunError, LightrunResult};
use crate::project::AccessibleBinaryMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Bump whenever the record layout changes
pub const SCHEMA_VERSION: u32 = 1;

const ENTRY_PREFIX: &str = "bins-";
const ENTRY_EXT: &str = "json";
const LOCK_EXT: &str = "lock";

/// One memoized enumeration result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub schema_version: u32,
    /// Canonical workspace directory
    pub key: PathBuf,
    pub computed_at: DateTime<Utc>,
    pub value: AccessibleBinaryMap,
}

#[derive(Deserialize)]
struct RecordHeader {
    schema_version: u32,
}

impl CacheEntry {
    pub fn new(key: &Path, value: AccessibleBinaryMap) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            key: key.to_path_buf(),
            computed_at: Utc::now(),
            value,
        }
    }

    /// Decode a record, returning `None` for foreign or corrupt content
    pub fn decode(content: &str) -> Option<Self> {
        let header: RecordHeader = match serde_json::from_str(content) {
            Ok(h) => h,
            Err(e) => {
                debug!("Cache record has no readable header: {}", e);
                return None;
            }
        };

        if header.schema_version != SCHEMA_VERSION {
            debug!(
                "Cache record schema {} does not match {}",
                header.schema_version, SCHEMA_VERSION
            );
            return None;
        }

        serde_json::from_str(content)
            .map_err(|e| debug!("Cache record failed to decode: {}", e))
            .ok()
    }

    /// Read the record for `key` from `path`, if present and valid
    pub async fn read(path: &Path, key: &Path) -> Option<Self> {
        let content = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                return None;
            }
        };

        let entry = Self::decode(&content)?;
        if entry.key != key {
            warn!(
                "Cache file {} belongs to {}, ignoring",
                path.display(),
                entry.key.display()
            );
            return None;
        }
        Some(entry)
    }

    /// Write the record through a temp file and an atomic rename
    pub async fn write(&self, path: &Path) -> LightrunResult<()> {
        let parent = path
            .parent()
            .ok_or_else(|| LightrunError::Internal(format!("{} has no parent", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let content = serde_json::to_vec_pretty(self)?;
        fs::write(&tmp_path, content).await.map_err(|e| {
            LightrunError::io(format!("writing cache file {}", tmp_path.display()), e)
        })?;

        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(LightrunError::io(
                format!("replacing cache file {}", path.display()),
                e,
            ));
        }

        Ok(())
    }
}

/// Short stable digest of a cache key
pub fn key_digest(key: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.to_string_lossy().as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

/// Path of the record for `key` inside the cache directory
pub fn entry_path(dir: &Path, key: &Path) -> PathBuf {
    dir.join(format!("{}{}.{}", ENTRY_PREFIX, key_digest(key), ENTRY_EXT))
}

/// Path of the advisory lock guarding the record for `key`
pub fn lock_path(dir: &Path, key: &Path) -> PathBuf {
    dir.join(format!("{}{}.{}", ENTRY_PREFIX, key_digest(key), LOCK_EXT))
}

/// Lock guarding a record or lock file found in the cache directory
///
/// `None` for anything else, including in-flight temp files.
pub fn owning_lock(path: &Path) -> Option<PathBuf> {
    let prefixed = path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with(ENTRY_PREFIX));
    let ext = path.extension()?;
    (prefixed && (ext == ENTRY_EXT || ext == LOCK_EXT)).then(|| path.with_extension(LOCK_EXT))
}

/// Record guarded by `lock`
pub fn guarded_entry(lock: &Path) -> PathBuf {
    lock.with_extension(ENTRY_EXT)
}

/// Whether a directory entry is a persisted record
pub fn is_entry_file(path: &Path) -> bool {
    let is_json = path.extension().is_some_and(|ext| ext == ENTRY_EXT);
    let prefixed = path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with(ENTRY_PREFIX));
    is_json && prefixed
}
