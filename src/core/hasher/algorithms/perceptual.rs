//! Perceptual Hash (pHash).
//!
//! pHash keeps the low-frequency DCT coefficients of the image and
//! thresholds them against their mean, which makes it robust to:
//! - Scaling
//! - Brightness/contrast changes
//! - Compression artifacts
//!
//! The DCT and thresholding come from the `image_hasher` crate.

use super::super::traits::{HashAlgorithm, HashMethod};
use super::super::HashBits;
use crate::error::HashError;
use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};

pub struct PerceptualHasher {
    hash_size: u32,
    hasher: Hasher,
}

impl PerceptualHasher {
    pub fn new(hash_size: u32) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();

        Self { hash_size, hasher }
    }
}

impl HashAlgorithm for PerceptualHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<HashBits, HashError> {
        let hash = self.hasher.hash_image(image);
        HashBits::from_bytes(hash.as_bytes().to_vec(), self.hash_size * self.hash_size)
    }

    fn method(&self) -> HashMethod {
        HashMethod::Phash
    }

    fn hash_size(&self) -> u32 {
        self.hash_size
    }
}
