//! Average Hash (aHash).
//!
//! 1. Reduce the image to a `size x size` grayscale grid
//! 2. Compute the mean brightness
//! 3. Each cell brighter than the mean sets its bit

use super::super::fast_resize::resize_to_grayscale;
use super::super::traits::{HashAlgorithm, HashMethod};
use super::super::HashBits;
use crate::error::HashError;
use image::DynamicImage;

pub struct AverageHasher {
    hash_size: u32,
}

impl AverageHasher {
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }
}

impl HashAlgorithm for AverageHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<HashBits, HashError> {
        let gray = resize_to_grayscale(image, self.hash_size, self.hash_size)?;

        let total: u64 = gray.pixels().map(|p| p[0] as u64).sum();
        let count = (self.hash_size as u64) * (self.hash_size as u64);
        let average = (total / count) as u8;

        Ok(HashBits::from_bits(gray.pixels().map(|p| p[0] > average)))
    }

    fn method(&self) -> HashMethod {
        HashMethod::Ahash
    }

    fn hash_size(&self) -> u32 {
        self.hash_size
    }
}
