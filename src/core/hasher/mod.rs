//! # Hasher Module
//!
//! Computes perceptual hash codes for images.
//!
//! ## Supported Methods
//! - **pHash (Perceptual Hash)** - Most robust, handles edits well
//! - **aHash (Average Hash)** - Fastest, good for exact duplicates
//! - **dHash (Difference Hash)** - Brightness gradients
//! - **wHash (Wavelet Hash)** - Haar low-frequency band
//!
//! ## How It Works
//! 1. Decode and downscale the image (longest side at most 512 px)
//! 2. Reduce it to a `size x size` grayscale grid
//! 3. Derive `size²` bits from the grid
//! 4. Compare codes using Hamming distance
//!
//! ## Example
//! ```rust,ignore
//! use photo_library_matcher::core::hasher::{HasherConfig, HashMethod};
//!
//! let codec = HasherConfig::new()
//!     .method(HashMethod::Dhash)
//!     .hash_size(8)
//!     .build()?;
//!
//! let bits = codec.hash_file(&path)?;
//! ```

mod algorithms;
mod bits;
mod code;
pub mod decode;
pub mod fast_resize;
mod traits;

pub use algorithms::{AverageHasher, DifferenceHasher, PerceptualHasher, WaveletHasher};
pub use bits::HashBits;
pub use code::{HashCode, HashParams};
pub use traits::{HashAlgorithm, HashMethod};

use crate::error::{HashError, ValidationError};
use image::DynamicImage;
use std::path::Path;

/// Longest side an image may have when it reaches a hash algorithm
pub const MAX_HASH_INPUT_DIMENSION: u32 = 512;

/// Configuration builder for the hash codec
#[derive(Debug, Clone)]
pub struct HasherConfig {
    /// Grid dimension; codes carry `hash_size²` bits
    hash_size: u32,
    method: HashMethod,
}

impl HasherConfig {
    /// pHash at size 16
    pub fn new() -> Self {
        Self {
            hash_size: 16,
            method: HashMethod::Phash,
        }
    }

    /// Set the grid size.
    ///
    /// - 8: 64 bits, fast, good for exact duplicates
    /// - 16: 256 bits, tolerant of edits and recompression
    pub fn hash_size(mut self, size: u32) -> Self {
        self.hash_size = size;
        self
    }

    pub fn method(mut self, method: HashMethod) -> Self {
        self.method = method;
        self
    }

    /// Build the codec
    pub fn build(self) -> Result<HashCodec, ValidationError> {
        if self.hash_size == 0 {
            return Err(ValidationError::InvalidHashSize {
                value: self.hash_size,
            });
        }

        let algorithm: Box<dyn HashAlgorithm> = match self.method {
            HashMethod::Phash => Box::new(PerceptualHasher::new(self.hash_size)),
            HashMethod::Ahash => Box::new(AverageHasher::new(self.hash_size)),
            HashMethod::Dhash => Box::new(DifferenceHasher::new(self.hash_size)),
            HashMethod::Whash => Box::new(WaveletHasher::new(self.hash_size)),
        };

        Ok(HashCodec {
            params: HashParams::new(self.method, self.hash_size),
            algorithm,
        })
    }
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns decoded images or image files into hash bits of one method and size.
///
/// Shared read-only by every worker thread.
pub struct HashCodec {
    params: HashParams,
    algorithm: Box<dyn HashAlgorithm>,
}

impl HashCodec {
    pub fn params(&self) -> HashParams {
        self.params
    }

    /// Hash a decoded image, downscaling it first when it is large.
    pub fn hash_image(&self, image: &DynamicImage) -> Result<HashBits, HashError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(HashError::ComputationFailed(
                "cannot hash an image with no pixels".to_string(),
            ));
        }

        let bits = if image.width().max(image.height()) > MAX_HASH_INPUT_DIMENSION {
            let small = image.thumbnail(MAX_HASH_INPUT_DIMENSION, MAX_HASH_INPUT_DIMENSION);
            self.algorithm.hash_image(&small)?
        } else {
            self.algorithm.hash_image(image)?
        };

        if bits.len() != self.params.bit_len() {
            return Err(HashError::ComputationFailed(format!(
                "{} produced {} bits, expected {}",
                self.params,
                bits.len(),
                self.params.bit_len()
            )));
        }

        Ok(bits)
    }

    /// Decode and hash a file.
    pub fn hash_file(&self, path: &Path) -> Result<HashBits, HashError> {
        let image = decode::decode_file(path)?;
        self.hash_image(&image)
    }
}

impl std::fmt::Debug for HashCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashCodec").field("params", &self.params).finish()
    }
}
