//! Trait definitions for perceptual hashing.

use super::HashBits;
use crate::error::HashError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Available hash methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMethod {
    /// Perceptual Hash (pHash) - DCT based, most robust to edits
    Phash,
    /// Average Hash (aHash) - fast, good for exact duplicates
    Ahash,
    /// Difference Hash (dHash) - brightness gradients between neighbours
    Dhash,
    /// Wavelet Hash (wHash) - Haar wavelet low-frequency band
    Whash,
}

impl HashMethod {
    pub const ALL: [HashMethod; 4] = [
        HashMethod::Phash,
        HashMethod::Ahash,
        HashMethod::Dhash,
        HashMethod::Whash,
    ];

    /// Short lowercase name used in artifacts and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            HashMethod::Phash => "phash",
            HashMethod::Ahash => "ahash",
            HashMethod::Dhash => "dhash",
            HashMethod::Whash => "whash",
        }
    }

    /// Get a human-readable description of the method
    pub fn description(&self) -> &'static str {
        match self {
            HashMethod::Phash => "Perceptual Hash (pHash) - DCT-based, robust to edits and recompression",
            HashMethod::Ahash => "Average Hash (aHash) - Compares each cell to the mean brightness",
            HashMethod::Dhash => "Difference Hash (dHash) - Compares brightness gradients between pixels",
            HashMethod::Whash => "Wavelet Hash (wHash) - Haar low-frequency band against its median",
        }
    }
}

impl std::fmt::Display for HashMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashMethod {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phash" => Ok(HashMethod::Phash),
            "ahash" => Ok(HashMethod::Ahash),
            "dhash" => Ok(HashMethod::Dhash),
            "whash" => Ok(HashMethod::Whash),
            other => Err(HashError::UnsupportedMethod {
                method: other.to_string(),
            }),
        }
    }
}

/// Trait for hash algorithm implementations.
///
/// Implementations receive an already-downscaled image and must return
/// exactly `hash_size()²` bits.
pub trait HashAlgorithm: Send + Sync {
    /// Compute a hash from an already-loaded image
    fn hash_image(&self, image: &DynamicImage) -> Result<HashBits, HashError>;

    /// The method this algorithm implements
    fn method(&self) -> HashMethod;

    /// Grid dimension of the hash
    fn hash_size(&self) -> u32;
}
