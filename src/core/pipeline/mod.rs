//! # Pipeline Module
//!
//! Orchestrates a full scan run.
//!
//! ## Pipeline Stages
//! 1. **List** - Ask each catalog for its items
//! 2. **Hash** - Compute hash codes on the worker pool (with caching)
//! 3. **Index** - Build one BK-tree per library
//! 4. **Match** - Dedupe each library, match secondary against primary
//! 5. **Write** - Leave review artifacts in the output directory
//!
//! Configuration errors are reported before any catalog is listed.
//! Per-item hashing errors never stop the run.

mod config;
mod executor;

pub use config::ScanConfig;
pub use executor::{LibraryStatus, LibrarySummary, ScanReport, Scanner, ScannerBuilder};
