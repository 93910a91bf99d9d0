//! # Cache Module
//!
//! Persists hash codes between runs so unchanged photos are not decoded
//! again.
//!
//! ## Benefits
//! - Subsequent scans are much faster
//! - Only new or modified photos need hashing
//! - Invalidation based on file size and modification time
//!
//! One JSON file per library (`<output>/<library>_hashes.json`) maps owner
//! ids to their last hash. The file doubles as the hash-map artifact of a
//! run.

use crate::core::artifacts::write_atomic;
use crate::core::hasher::{HashBits, HashParams};
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Format version written into every cache file
const CACHE_VERSION: u32 = 1;

/// Size and modification time of a source file at hashing time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    #[serde(rename = "file_size")]
    pub size: u64,
    /// Modification time in milliseconds since the Unix epoch
    pub modified_ms: u64,
}

impl FileStamp {
    pub fn new(size: u64, modified: SystemTime) -> Self {
        let modified_ms = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { size, modified_ms }
    }

    /// Stamp of the file currently at `path`
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self::new(metadata.len(), metadata.modified()?))
    }
}

/// A cached hash entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub params: HashParams,
    pub bits: HashBits,
    /// File that was hashed (original or edited rendition)
    pub source_path: PathBuf,
    #[serde(flatten)]
    pub stamp: FileStamp,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(params: HashParams, bits: HashBits, source_path: PathBuf, stamp: FileStamp) -> Self {
        Self {
            params,
            bits,
            source_path,
            stamp,
            cached_at: Utc::now(),
        }
    }

    /// Whether this entry still describes `source_path` hashed with `params`
    pub fn is_valid_for(&self, params: HashParams, source_path: &Path, stamp: FileStamp) -> bool {
        self.params == params
            && self.bits.len() == params.bit_len()
            && self.source_path == source_path
            && self.stamp == stamp
    }
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

/// Hash cache of one library, keyed by owner id.
#[derive(Debug, Clone, Default)]
pub struct HashCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache file for `library` inside the output directory
    pub fn path_for(output_dir: &Path, library: &str) -> PathBuf {
        output_dir.join(format!("{}_hashes.json", library))
    }

    /// Load a cache file. A missing file is an empty cache.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(CacheError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let file: CacheFile = serde_json::from_str(&content).map_err(|e| {
            tracing::warn!("Unreadable hash cache {}: {}", path.display(), e);
            CacheError::Corrupted {
                path: path.to_path_buf(),
            }
        })?;

        if file.version != CACHE_VERSION {
            tracing::info!(
                "Ignoring hash cache {} with version {}",
                path.display(),
                file.version
            );
            return Ok(Self::new());
        }

        Ok(Self {
            entries: file.entries,
        })
    }

    /// Write the cache atomically
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let file = CacheFile {
            version: CACHE_VERSION,
            entries: self.entries.clone(),
        };

        write_atomic(path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, &file).map_err(std::io::Error::from)
        })
        .map_err(|e| CacheError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Cached bits for `owner_id`, if the entry is still valid
    pub fn lookup(
        &self,
        owner_id: &str,
        params: HashParams,
        source_path: &Path,
        stamp: FileStamp,
    ) -> Option<&HashBits> {
        self.entries
            .get(owner_id)
            .filter(|entry| entry.is_valid_for(params, source_path, stamp))
            .map(|entry| &entry.bits)
    }

    pub fn insert(&mut self, owner_id: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(owner_id.into(), entry);
    }

    pub fn get(&self, owner_id: &str) -> Option<&CacheEntry> {
        self.entries.get(owner_id)
    }

    /// Drop entries whose owner is no longer listed. Returns how many were removed.
    pub fn retain_owners(&mut self, owners: &HashSet<&str>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| owners.contains(id.as_str()));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
