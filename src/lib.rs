//! # Photo Library Matcher
//!
//! Finds near-duplicate photos inside a library and matches the items of a
//! second library against the first, using perceptual hashes.
//!
//! ## Core Philosophy
//! - **Never touch the libraries** - Output is a ranked list for human review
//! - **Deterministic** - Same inputs give byte-identical candidate files
//! - **Keep going** - One unreadable photo never stops a run
//!
//! ## Architecture
//! - `core` - The matching engine
//! - `events` - Event-driven progress reporting
//! - `error` - User-friendly error types

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{MatcherError, Result};

/// Initialize tracing for the library
///
/// Honors `RUST_LOG`, falling back to `default_directive` when it is unset.
/// Calling it twice is harmless.
pub fn init_tracing(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
