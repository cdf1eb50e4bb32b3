//! Texture size capping and final texture encoding

use crate::capability::TextureCompressor;
use crate::config::TextureSizeCap;
use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};
use kiln_core::{KilnError, Result};
use std::io::Cursor;

/// Dimensions after fitting `(width, height)` inside a `max` x `max` square.
///
/// Aspect ratio is kept, the larger side lands exactly on `max`, and no
/// side drops below 1. Textures already within bounds are unchanged.
pub fn capped_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    let max = max.max(1);
    if width <= max && height <= max {
        return (width, height);
    }

    let scale = |small: u32, large: u32| -> u32 {
        let scaled = (small as u64 * max as u64 + large as u64 / 2) / large as u64;
        (scaled as u32).clamp(1, max)
    };

    if width >= height {
        (max, scale(height, width))
    } else {
        (scale(width, height), max)
    }
}

/// Downsample a texture so neither side exceeds the policy. Never upsamples.
pub fn cap_texture(image: RgbaImage, cap: TextureSizeCap) -> RgbaImage {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = capped_dimensions(width, height, cap.max_dimension());
    if (new_width, new_height) == (width, height) {
        return image;
    }

    tracing::debug!(width, height, new_width, new_height, "capping texture");
    image::imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

/// Mean Rec.709 luminance of a texture, in 0..=1
pub fn mean_luminance(image: &RgbaImage) -> f32 {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return 0.0;
    }

    let total: f64 = image
        .pixels()
        .map(|p| {
            let [r, g, b, _] = p.0;
            0.2126 * r as f64 + 0.7152 * g as f64 + 0.0722 * b as f64
        })
        .sum();

    (total / count as f64 / 255.0) as f32
}

/// Decode any format `image` understands into RGBA8
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| KilnError::TextureError(format!("Failed to decode texture: {}", e)))
}

/// Encodes final textures as PNG
#[derive(Debug, Default, Clone, Copy)]
pub struct PngTextureEncoder;

impl TextureCompressor for PngTextureEncoder {
    fn extension(&self) -> &str {
        "png"
    }

    fn compress(&self, image: &RgbaImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| KilnError::TextureError(format!("Failed to encode PNG: {}", e)))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_capped_dimensions_keep_aspect() {
        assert_eq!(capped_dimensions(2048, 1024, 512), (512, 256));
        assert_eq!(capped_dimensions(1000, 3000, 300), (100, 300));
        assert_eq!(capped_dimensions(4096, 1, 128), (128, 1));
        assert_eq!(capped_dimensions(256, 256, 256), (256, 256));
    }

    #[test]
    fn test_never_upsamples() {
        assert_eq!(capped_dimensions(64, 32, 4096), (64, 32));
        let img = RgbaImage::new(10, 20);
        let capped = cap_texture(img, TextureSizeCap::X128);
        assert_eq!(capped.dimensions(), (10, 20));
    }

    #[test]
    fn test_cap_is_idempotent() {
        let img = RgbaImage::from_pixel(300, 170, Rgba([10, 200, 30, 255]));
        let once = cap_texture(img, TextureSizeCap::Custom(100));
        assert_eq!(once.dimensions(), (100, 57));
        let twice = cap_texture(once.clone(), TextureSizeCap::Custom(100));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_capping_never_grows_a_side() {
        for (w, h) in [(1, 5000), (5000, 1), (513, 512), (3, 3), (777, 2049)] {
            for cap in [TextureSizeCap::X128, TextureSizeCap::X512, TextureSizeCap::Custom(7)] {
                let (nw, nh) = capped_dimensions(w, h, cap.max_dimension());
                assert!(nw <= w && nh <= h);
                assert!(nw <= cap.max_dimension() && nh <= cap.max_dimension());
                assert!(nw >= 1 && nh >= 1);
            }
        }
    }

    #[test]
    fn test_mean_luminance() {
        let white = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        assert!((mean_luminance(&white) - 1.0).abs() < 1e-5);
        let black = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        assert_eq!(mean_luminance(&black), 0.0);
        let green = RgbaImage::from_pixel(1, 1, Rgba([0, 255, 0, 255]));
        assert!((mean_luminance(&green) - 0.7152).abs() < 1e-4);
    }

    #[test]
    fn test_png_encode_decodes_back() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]));
        let bytes = PngTextureEncoder.compress(&img).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        assert_eq!(decode_rgba(&bytes).unwrap(), img);
    }
}
