//! # Error Module
//!
//! Error types for the photo library matcher.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, owner ids, what went wrong
//! - **Per-item vs fatal** - `HashError` is recorded per photo and the run
//!   continues; everything else stops the run
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Failed to start the hashing workers: {0}")]
    WorkerPool(String),
}

/// Errors that occur while hashing a single image
#[derive(Error, Debug)]
pub enum HashError {
    #[error("File not found: {path}")]
    MissingFile { path: PathBuf },

    #[error("Failed to decode image {path}: {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Image is empty or corrupted: {path}")]
    EmptyImage { path: PathBuf },

    #[error("Hash computation failed: {0}")]
    ComputationFailed(String),

    #[error("Unsupported hash method '{method}'. Choose one of: phash, ahash, dhash, whash")]
    UnsupportedMethod { method: String },

    #[error("Failed to open image file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Whether this error means the file could not be found at all
    pub fn is_missing_file(&self) -> bool {
        match self {
            HashError::MissingFile { .. } => true,
            HashError::IoError { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Errors raised by the similarity index
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error(
        "Cannot compare {left_method}/{left_size} hash with {right_method}/{right_size} hash. \
         All libraries in a run must use the same hash method and size."
    )]
    IncomparableHash {
        left_method: String,
        left_size: u32,
        right_method: String,
        right_size: u32,
    },
}

/// Configuration problems detected before any work starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Hash size must be a positive integer, got {value}")]
    InvalidHashSize { value: u32 },

    #[error("{name} threshold {value} exceeds the hash length of {max} bits")]
    ThresholdOutOfRange {
        name: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Worker count must be at least 1, got {value}")]
    InvalidWorkerCount { value: usize },

    #[error("Both libraries are tagged '{tag}'. Use one photos and one iphoto library.")]
    DuplicateLibraryTag { tag: String },

    #[error("No primary library was given")]
    MissingPrimaryLibrary,
}

/// Errors produced by a library catalog adapter
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Library not found: {path}")]
    LibraryNotFound { path: PathBuf },

    #[error("Failed to read library {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid library manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Duplicate item id '{id}' in library {library}")]
    DuplicateId { library: String, id: String },

    #[error("Item id '{id}' appears in both {first} and {second} libraries")]
    SharedId {
        id: String,
        first: String,
        second: String,
    },
}

/// Errors that occur with the hash cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read hash cache at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Hash cache corruption detected at {path}. Delete this file and try again.")]
    Corrupted { path: PathBuf },

    #[error("Failed to write hash cache at {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
}

/// Errors that occur while writing run artifacts
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, MatcherError>;
