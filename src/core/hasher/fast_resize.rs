//! Grid reduction with SIMD-accelerated resizing.
//!
//! Every hash method starts by shrinking the image to a small grayscale
//! grid. `fast_image_resize` does this 5-14x faster than the image crate
//! and picks AVX2/NEON when available.

use crate::error::HashError;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GrayImage};

/// Reusable grayscale resizer
pub struct FastResizer {
    resizer: Resizer,
}

impl FastResizer {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    /// Convert to grayscale and resize to exactly `width` x `height`.
    pub fn resize_to_grayscale(
        &mut self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<GrayImage, HashError> {
        if width == 0 || height == 0 {
            return Err(HashError::ComputationFailed(format!(
                "invalid grid dimensions {}x{}",
                width, height
            )));
        }

        // Grayscale first: one channel is cheaper to resize than three
        let gray = image.to_luma8();
        let (src_width, src_height) = gray.dimensions();

        if src_width == 0 || src_height == 0 {
            return Err(HashError::ComputationFailed(
                "source image has no pixels".to_string(),
            ));
        }

        let src_image = Image::from_vec_u8(src_width, src_height, gray.into_raw(), PixelType::U8)
            .map_err(|e| HashError::ComputationFailed(format!("invalid source buffer: {}", e)))?;
        let mut dst_image = Image::new(width, height, PixelType::U8);

        let options =
            ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));

        self.resizer
            .resize(&src_image, &mut dst_image, &options)
            .map_err(|e| HashError::ComputationFailed(format!("resize failed: {}", e)))?;

        GrayImage::from_raw(width, height, dst_image.into_vec()).ok_or_else(|| {
            HashError::ComputationFailed("resized buffer has the wrong length".to_string())
        })
    }
}

impl Default for FastResizer {
    fn default() -> Self {
        Self::new()
    }
}

/// One-off grayscale resize
pub fn resize_to_grayscale(
    image: &DynamicImage,
    width: u32,
    height: u32,
) -> Result<GrayImage, HashError> {
    FastResizer::new().resize_to_grayscale(image, width, height)
}
