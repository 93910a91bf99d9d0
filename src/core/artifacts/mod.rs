//! # Artifacts Module
//!
//! Flat files a run leaves in its output directory for review.
//!
//! | File | Contents |
//! |---|---|
//! | `pairs_for_review.csv` | ranked candidate pairs |
//! | `pairs_for_review.meta.json` | run id, timestamp, ordering, parameters |
//! | `unique_in_iphoto.csv` | secondary items with no match (only when any) |
//! | `hash_errors.log` | one line per hashing failure, appended per run |
//!
//! Everything except the error log is replaced atomically.

pub mod csv;

use crate::core::hasher::HashParams;
use crate::core::matcher::{CandidateSet, MatchConfig, PairCandidate, UnmatchedRecord};
use crate::core::pool::HashFailure;
use crate::error::ArtifactError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const PAIRS_FILE: &str = "pairs_for_review.csv";
pub const PAIRS_META_FILE: &str = "pairs_for_review.meta.json";
pub const UNMATCHED_FILE: &str = "unique_in_iphoto.csv";
pub const ERROR_LOG_FILE: &str = "hash_errors.log";

/// Order the candidate list is sorted by
pub const ORDERING: [&str; 3] = ["distance", "pair_type", "pair_id"];

/// Write `path` through a temporary file in the same directory, then
/// rename it into place.
pub fn write_atomic<F>(path: &Path, write: F) -> std::io::Result<()>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Sidecar describing how `pairs_for_review.csv` was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub ordering: Vec<String>,
    pub hash_method: String,
    pub hash_size: u32,
    pub dedupe_threshold: u32,
    pub cross_threshold: u32,
    pub pair_count: usize,
}

impl RunMetadata {
    pub fn new(run_id: &str, params: HashParams, config: MatchConfig, pair_count: usize) -> Self {
        Self {
            run_id: run_id.to_string(),
            generated_at: Utc::now(),
            ordering: ORDERING.iter().map(|s| s.to_string()).collect(),
            hash_method: params.method.to_string(),
            hash_size: params.size,
            dedupe_threshold: config.dedupe_threshold,
            cross_threshold: config.cross_threshold,
            pair_count,
        }
    }
}

/// Files written by one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub pairs: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub unmatched: Option<PathBuf>,
    pub error_log: Option<PathBuf>,
}

/// Writes run artifacts into one output directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_of(&self, file: &str) -> PathBuf {
        self.output_dir.join(file)
    }

    /// Create the output directory if needed
    pub fn ensure_dir(&self) -> Result<(), ArtifactError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| ArtifactError::CreateDir {
            path: self.output_dir.clone(),
            source: e,
        })
    }

    fn write_failed(path: &Path, error: impl std::fmt::Display) -> ArtifactError {
        ArtifactError::WriteFailed {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }
    }

    /// Ranked pairs and their metadata sidecar
    pub fn write_candidates(
        &self,
        candidates: &[PairCandidate],
        metadata: &RunMetadata,
    ) -> Result<(PathBuf, PathBuf), ArtifactError> {
        self.ensure_dir()?;

        let pairs_path = self.path_of(PAIRS_FILE);
        write_atomic(&pairs_path, |writer| csv::export_pairs(candidates, writer))
            .map_err(|e| Self::write_failed(&pairs_path, e))?;

        let meta_path = self.path_of(PAIRS_META_FILE);
        write_atomic(&meta_path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, metadata).map_err(std::io::Error::from)
        })
        .map_err(|e| Self::write_failed(&meta_path, e))?;

        Ok((pairs_path, meta_path))
    }

    /// Unmatched secondary items. Nothing is written when there are none,
    /// and a file left by an earlier run is removed.
    pub fn write_unmatched(
        &self,
        unmatched: &[UnmatchedRecord],
    ) -> Result<Option<PathBuf>, ArtifactError> {
        let path = self.path_of(UNMATCHED_FILE);

        if unmatched.is_empty() {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed stale {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Self::write_failed(&path, e)),
            }
            return Ok(None);
        }

        self.ensure_dir()?;
        write_atomic(&path, |writer| csv::export_unmatched(unmatched, writer))
            .map_err(|e| Self::write_failed(&path, e))?;
        Ok(Some(path))
    }

    /// Append failures to the error log
    pub fn append_errors(&self, failures: &[HashFailure]) -> Result<Option<PathBuf>, ArtifactError> {
        if failures.is_empty() {
            return Ok(None);
        }

        self.ensure_dir()?;
        let path = self.path_of(ERROR_LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Self::write_failed(&path, e))?;

        let mut writer = BufWriter::new(file);
        csv::export_failures(failures, &mut writer)
            .and_then(|()| writer.flush())
            .map_err(|e| Self::write_failed(&path, e))?;

        Ok(Some(path))
    }

    /// Every artifact of a finished run
    pub fn write_all(
        &self,
        set: &CandidateSet,
        failures: &[HashFailure],
        metadata: &RunMetadata,
    ) -> Result<ArtifactPaths, ArtifactError> {
        let (pairs, meta) = self.write_candidates(&set.candidates, metadata)?;
        let unmatched = self.write_unmatched(&set.unmatched)?;
        let error_log = self.append_errors(failures)?;

        tracing::info!(
            "Wrote {} candidate pairs to {}",
            set.candidates.len(),
            pairs.display()
        );

        Ok(ArtifactPaths {
            pairs: Some(pairs),
            metadata: Some(meta),
            unmatched,
            error_log,
        })
    }
}
