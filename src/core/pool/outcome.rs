//! What the worker pool produces for each record.

use crate::core::cache::CacheEntry;
use crate::core::catalog::{ImageRef, LibraryTag};
use crate::core::hasher::HashCode;
use crate::error::HashError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Successfully hashed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedImage {
    pub code: HashCode,
    pub image: ImageRef,
    /// Served from the hash cache without decoding
    pub from_cache: bool,
}

/// Why an item could not be hashed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MissingFile,
    Decode,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingFile => "missing_file",
            FailureKind::Decode => "decode",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal per-item error. The item is left out of every index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashFailure {
    pub owner_id: String,
    pub library: LibraryTag,
    pub path: PathBuf,
    pub kind: FailureKind,
    pub reason: String,
}

impl HashFailure {
    pub fn from_error(
        owner_id: impl Into<String>,
        library: LibraryTag,
        path: PathBuf,
        error: &HashError,
    ) -> Self {
        let kind = if error.is_missing_file() {
            FailureKind::MissingFile
        } else {
            FailureKind::Decode
        };
        Self {
            owner_id: owner_id.into(),
            library,
            path,
            kind,
            reason: error.to_string(),
        }
    }
}

/// Item that was never started because the run was cancelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteItem {
    pub owner_id: String,
    pub library: LibraryTag,
}

/// Exactly one of these per input record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashOutcome {
    Hashed(HashedImage),
    Failed(HashFailure),
    Incomplete(IncompleteItem),
}

impl HashOutcome {
    pub fn owner_id(&self) -> &str {
        match self {
            HashOutcome::Hashed(hashed) => &hashed.code.owner_id,
            HashOutcome::Failed(failure) => &failure.owner_id,
            HashOutcome::Incomplete(item) => &item.owner_id,
        }
    }
}

/// Everything the pool collected for one library
#[derive(Debug, Clone)]
pub struct HashBatch {
    pub library: LibraryTag,
    /// One outcome per input record, in input order
    pub outcomes: Vec<HashOutcome>,
    /// Entries to write back into the hash cache
    pub fresh_entries: Vec<(String, CacheEntry)>,
    pub cache_hits: usize,
}

impl HashBatch {
    pub fn hashed_count(&self) -> usize {
        self.count(|o| matches!(o, HashOutcome::Hashed(_)))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, HashOutcome::Failed(_)))
    }

    pub fn incomplete_count(&self) -> usize {
        self.count(|o| matches!(o, HashOutcome::Incomplete(_)))
    }

    fn count(&self, predicate: impl Fn(&HashOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }

    /// Split outcomes by kind, keeping input order within each
    pub fn into_parts(self) -> (Vec<HashedImage>, Vec<HashFailure>, Vec<IncompleteItem>) {
        let mut hashed = Vec::new();
        let mut failed = Vec::new();
        let mut incomplete = Vec::new();
        for outcome in self.outcomes {
            match outcome {
                HashOutcome::Hashed(h) => hashed.push(h),
                HashOutcome::Failed(f) => failed.push(f),
                HashOutcome::Incomplete(i) => incomplete.push(i),
            }
        }
        (hashed, failed, incomplete)
    }
}
