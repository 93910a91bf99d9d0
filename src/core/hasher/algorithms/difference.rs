//! Difference Hash (dHash).
//!
//! 1. Reduce the image to a `(size + 1) x size` grayscale grid
//! 2. Compare each cell with its right-hand neighbour
//! 3. A cell brighter than its neighbour sets its bit
//!
//! This captures the relative gradient of brightness changes.

use super::super::fast_resize::resize_to_grayscale;
use super::super::traits::{HashAlgorithm, HashMethod};
use super::super::HashBits;
use crate::error::HashError;
use image::DynamicImage;

pub struct DifferenceHasher {
    hash_size: u32,
}

impl DifferenceHasher {
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }
}

impl HashAlgorithm for DifferenceHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<HashBits, HashError> {
        // One extra column to compute differences
        let gray = resize_to_grayscale(image, self.hash_size + 1, self.hash_size)?;
        let size = self.hash_size;

        let mut bits = Vec::with_capacity((size * size) as usize);
        for y in 0..size {
            for x in 0..size {
                bits.push(gray.get_pixel(x, y)[0] > gray.get_pixel(x + 1, y)[0]);
            }
        }

        Ok(HashBits::from_bits(bits))
    }

    fn method(&self) -> HashMethod {
        HashMethod::Dhash
    }

    fn hash_size(&self) -> u32 {
        self.hash_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn gradient(rising: bool) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(100, 100, |x, _| {
            let step = if rising { x } else { 99 - x };
            let v = (step * 255 / 99) as u8;
            Rgb([v, v, v])
        }))
    }

    #[test]
    fn identical_images_produce_identical_hash() {
        let hasher = DifferenceHasher::new(8);
        let a = hasher.hash_image(&gradient(true)).unwrap();
        let b = hasher.hash_image(&gradient(true)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn opposite_gradients_are_maximally_different() {
        let hasher = DifferenceHasher::new(8);
        let rising = hasher.hash_image(&gradient(true)).unwrap();
        let falling = hasher.hash_image(&gradient(false)).unwrap();

        assert!(rising.as_bytes().iter().all(|&b| b == 0x00));
        assert!(falling.as_bytes().iter().all(|&b| b == 0xFF));
        assert_eq!(rising.hamming(&falling), 64);
    }

    #[test]
    fn hash_size_controls_bit_count() {
        let image = gradient(true);
        assert_eq!(DifferenceHasher::new(8).hash_image(&image).unwrap().len(), 64);
        assert_eq!(DifferenceHasher::new(16).hash_image(&image).unwrap().len(), 256);
        assert_eq!(DifferenceHasher::new(5).hash_image(&image).unwrap().len(), 25);
    }
}
