//! Scan configuration and its validation.

use crate::core::hasher::{HashMethod, HashParams};
use crate::core::matcher::MatchConfig;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Configuration for a scan run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub hash_method: HashMethod,
    /// Grid size; codes carry `hash_size²` bits
    pub hash_size: u32,
    /// Maximum distance for pairs within one library
    pub dedupe_threshold: u32,
    /// Maximum distance for pairs across libraries
    pub cross_threshold: u32,
    /// Hashing threads
    pub workers: usize,
    /// Hash the edited rendition when a library has one
    pub prefer_edited: bool,
    /// Reuse and refresh `<library>_hashes.json` in the output directory
    pub use_cache: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            hash_method: HashMethod::Phash,
            hash_size: 16,
            dedupe_threshold: 5,
            cross_threshold: 8,
            workers: 4,
            prefer_edited: false,
            use_cache: true,
        }
    }
}

impl ScanConfig {
    /// Reject configurations before any work starts
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hash_size == 0 {
            return Err(ValidationError::InvalidHashSize {
                value: self.hash_size,
            });
        }

        let max = self.params().bit_len();
        for (name, value) in [
            ("dedupe", self.dedupe_threshold),
            ("cross-library", self.cross_threshold),
        ] {
            if value > max {
                return Err(ValidationError::ThresholdOutOfRange { name, value, max });
            }
        }

        if self.workers == 0 {
            return Err(ValidationError::InvalidWorkerCount {
                value: self.workers,
            });
        }

        Ok(())
    }

    pub fn params(&self) -> HashParams {
        HashParams::new(self.hash_method, self.hash_size)
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            dedupe_threshold: self.dedupe_threshold,
            cross_threshold: self.cross_threshold,
        }
    }
}
