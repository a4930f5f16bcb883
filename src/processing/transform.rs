//! Pixel-level transforms: alpha flattening, resizing, JPEG encoding.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

use crate::config::ResizeMode;
use crate::utils::error::{DatasetGenError, Result};

/// Canvas color used for padding and for flattening transparency
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Convert any color type to opaque RGB, compositing alpha onto white
pub fn convert_to_rgb(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut flattened = RgbImage::from_pixel(width, height, BACKGROUND);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        let mut out = [0u8; 3];
        for channel in 0..3 {
            let fg = pixel[channel] as u32 * alpha;
            let bg = BACKGROUND[channel] as u32 * (255 - alpha);
            out[channel] = ((fg + bg + 127) / 255) as u8;
        }
        flattened.put_pixel(x, y, Rgb(out));
    }

    flattened
}

/// Size that fits `(width, height)` inside a `target` square without enlarging
pub fn fit_within(width: u32, height: u32, target: u32) -> (u32, u32) {
    if width <= target && height <= target {
        return (width, height);
    }

    let scale = (target as f64 / width as f64).min(target as f64 / height as f64);
    let new_w = ((width as f64 * scale).round() as u32).clamp(1, target);
    let new_h = ((height as f64 * scale).round() as u32).clamp(1, target);
    (new_w, new_h)
}

/// Bring an RGB image to exactly `target`x`target`
pub fn resize_to_square(image: &RgbImage, target: u32, mode: ResizeMode) -> RgbImage {
    let (width, height) = image.dimensions();

    match mode {
        ResizeMode::Stretch => {
            if width == target && height == target {
                return image.clone();
            }
            imageops::resize(image, target, target, FilterType::Lanczos3)
        }
        ResizeMode::Pad => {
            let (new_w, new_h) = fit_within(width, height, target);
            let resized = if (new_w, new_h) == (width, height) {
                image.clone()
            } else {
                imageops::resize(image, new_w, new_h, FilterType::Lanczos3)
            };

            let mut canvas = RgbImage::from_pixel(target, target, BACKGROUND);
            let x_offset = (target - new_w) / 2;
            let y_offset = (target - new_h) / 2;
            imageops::overlay(&mut canvas, &resized, x_offset as i64, y_offset as i64);
            canvas
        }
    }
}

/// Encode an RGB image as JPEG at `quality`
pub fn save_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode_image(image)
        .map_err(|e| DatasetGenError::Image(path.to_path_buf(), e.to_string()))?;
    writer.flush()?;
    Ok(())
}
