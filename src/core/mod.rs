//! # Core Module
//!
//! The front-end agnostic matching engine.
//!
//! ## Modules
//! - `catalog` - Lists the items of a photo library
//! - `hasher` - Computes perceptual hash codes
//! - `cache` - Persists hash codes between runs
//! - `pool` - Hashes a library on a fixed set of worker threads
//! - `index` - BK-tree for Hamming range queries
//! - `matcher` - Turns index queries into ranked candidate pairs
//! - `artifacts` - Writes review files
//! - `pipeline` - Orchestrates the full workflow

pub mod artifacts;
pub mod cache;
pub mod catalog;
pub mod hasher;
pub mod index;
pub mod matcher;
pub mod pipeline;
pub mod pool;

// Re-export commonly used types
pub use catalog::{ImageRecord, ImageRef, LibraryCatalog, LibraryTag};
pub use hasher::{HashBits, HashCode, HashCodec, HashMethod, HashParams};
pub use index::SimilarityIndex;
pub use matcher::{CandidateGenerator, CandidateSet, PairCandidate, PairType, UnmatchedRecord};
pub use pipeline::{ScanConfig, ScanReport, Scanner};
pub use pool::{CancellationToken, HashWorkerPool};
