//! Wavelet Hash (wHash).
//!
//! 1. Reduce the image to a `4·size` square grayscale grid
//! 2. Apply the Haar transform twice, keeping only the LL (low/low) band,
//!    which leaves a `size x size` grid of coarse coefficients
//! 3. Each coefficient above the median sets its bit
//!
//! Removing the DC component before thresholding would only shift every
//! coefficient by the same amount, so the median comparison already
//! ignores it.

use super::super::fast_resize::resize_to_grayscale;
use super::super::traits::{HashAlgorithm, HashMethod};
use super::super::HashBits;
use crate::error::HashError;
use image::DynamicImage;

/// Haar levels applied between the sampling grid and the hash grid
const HAAR_LEVELS: u32 = 2;

pub struct WaveletHasher {
    hash_size: u32,
}

impl WaveletHasher {
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }
}

impl HashAlgorithm for WaveletHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<HashBits, HashError> {
        let mut width = (self.hash_size << HAAR_LEVELS) as usize;
        let gray = resize_to_grayscale(image, width as u32, width as u32)?;

        let mut band: Vec<f32> = gray.pixels().map(|p| p[0] as f32 / 255.0).collect();
        while width > self.hash_size as usize {
            band = haar_low_band(&band, width);
            width /= 2;
        }

        let median = median(&band);
        Ok(HashBits::from_bits(band.iter().map(|&v| v > median)))
    }

    fn method(&self) -> HashMethod {
        HashMethod::Whash
    }

    fn hash_size(&self) -> u32 {
        self.hash_size
    }
}

/// One 2D Haar step on a `width x width` grid, returning the LL quadrant.
fn haar_low_band(grid: &[f32], width: usize) -> Vec<f32> {
    let half = width / 2;
    let mut low = Vec::with_capacity(half * half);
    for y in 0..half {
        for x in 0..half {
            let i = 2 * y * width + 2 * x;
            low.push((grid[i] + grid[i + 1] + grid[i + width] + grid[i + width + 1]) / 2.0);
        }
    }
    low
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.is_empty() {
        0.0
    } else if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn quadrants(flip: bool) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(128, 128, |x, y| {
            let bright = (x < 64) ^ (y < 64) ^ flip;
            let v = if bright { 220 } else { 30 };
            Rgb([v, v, v])
        }))
    }

    #[test]
    fn haar_low_band_halves_the_grid() {
        let grid = vec![1.0; 16];
        let low = haar_low_band(&grid, 4);
        assert_eq!(low.len(), 4);
        assert!(low.iter().all(|&v| (v - 2.0).abs() < f32::EPSILON));
    }

    #[test]
    fn median_of_even_count_averages_middle_values() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn produces_size_squared_bits() {
        let hash = WaveletHasher::new(8).hash_image(&quadrants(false)).unwrap();
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn inverted_quadrants_flip_every_bit() {
        let hasher = WaveletHasher::new(8);
        let a = hasher.hash_image(&quadrants(false)).unwrap();
        let b = hasher.hash_image(&quadrants(true)).unwrap();
        assert_eq!(a.hamming(&b), 64);
    }

    #[test]
    fn is_deterministic() {
        let hasher = WaveletHasher::new(8);
        let image = quadrants(false);
        assert_eq!(hasher.hash_image(&image).unwrap(), hasher.hash_image(&image).unwrap());
    }
}
