//! Thumbnail generation for uploaded images
//!
//! Every image upload gets a fixed-size square thumbnail stored beside
//! the original. Output format follows the upload's MIME type.

use crate::config::THUMBNAIL_SIZE;
use crate::error::{AppError, Result};
use image::imageops::FilterType;
use image::ImageOutputFormat;
use std::io::Cursor;

const JPEG_QUALITY: u8 = 80;

/// Decode image bytes and produce a 200x200 thumbnail in the format
/// matching the given MIME type.
pub fn generate(data: &[u8], mime_type: &str) -> Result<Vec<u8>> {
    let img = image::load_from_memory(data)
        .map_err(|e| AppError::Thumbnail(format!("Failed to decode image: {}", e)))?;

    let thumb = img.resize_exact(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle);

    let format = match mime_type {
        "image/png" => ImageOutputFormat::Png,
        _ => ImageOutputFormat::Jpeg(JPEG_QUALITY),
    };

    let mut buf = Cursor::new(Vec::new());
    thumb
        .write_to(&mut buf, format)
        .map_err(|e| AppError::Thumbnail(format!("Failed to encode thumbnail: {}", e)))?;

    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120, 40, 200]),
        ));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_thumbnail_is_fixed_size() {
        let source = sample_png(37, 512);

        let thumb = generate(&source, "image/png").unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();

        assert_eq!(decoded.width(), THUMBNAIL_SIZE);
        assert_eq!(decoded.height(), THUMBNAIL_SIZE);
    }

    #[test]
    fn test_jpeg_output_for_jpeg_mime() {
        let source = sample_png(10, 10);

        let thumb = generate(&source, "image/jpeg").unwrap();
        let format = image::guess_format(&thumb).unwrap();

        assert_eq!(format, image::ImageFormat::Jpeg);
    }

    #[test]
    fn test_garbage_input_is_an_error() {
        let result = generate(b"definitely not an image", "image/png");
        assert!(matches!(result, Err(AppError::Thumbnail(_))));
    }
}
