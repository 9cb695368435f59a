//! Image file reading and writing through the `image` crate.

use std::path::Path;

use image::ColorType;
use lumen_core::errors::{LumenError, Result};
use lumen_core::logging::targets;

use crate::texture::ImageData;

/// Decodes an image file, keeping its channel count (1 to 4, 8 bits each).
pub fn load_image(path: &Path) -> Result<ImageData> {
    let decoded = image::open(path).map_err(|err| LumenError::parse(path.display().to_string(), err.to_string()))?;
    let (width, height) = (decoded.width(), decoded.height());
    let (channels, pixels) = match decoded.color().channel_count() {
        1 => (1, decoded.into_luma8().into_raw()),
        2 => (2, decoded.into_luma_alpha8().into_raw()),
        3 => (3, decoded.into_rgb8().into_raw()),
        _ => (4, decoded.into_rgba8().into_raw()),
    };
    log::debug!(
        target: targets::IMAGE_IO,
        "Decoded '{}' ({width}x{height}, {channels} channel(s))",
        path.display()
    );
    Ok(ImageData {
        width,
        height,
        channels,
        pixels,
    })
}

/// Encodes linear RGB float pixels, e.g. as OpenEXR. The format follows the
/// file extension.
pub fn save_rgb32f(width: u32, height: u32, pixels: &[f32], path: &Path) -> Result<()> {
    let expected = width as usize * height as usize * 3;
    if pixels.len() != expected {
        return Err(LumenError::invalid_argument(format!(
            "float image buffer holds {} values, expected {expected}",
            pixels.len()
        )));
    }
    image::save_buffer(path, bytemuck::cast_slice(pixels), width, height, ColorType::Rgb32F)
        .map_err(|err| LumenError::parse(path.display().to_string(), err.to_string()))?;
    log::debug!(target: targets::IMAGE_IO, "Wrote '{}' ({width}x{height}, rgb32f)", path.display());
    Ok(())
}

/// Encodes `data`; the format follows the file extension.
pub fn save_image(data: &ImageData, path: &Path) -> Result<()> {
    let color = match data.channels {
        1 => ColorType::L8,
        2 => ColorType::La8,
        3 => ColorType::Rgb8,
        4 => ColorType::Rgba8,
        other => {
            return Err(LumenError::invalid_argument(format!(
                "cannot encode an image with {other} channels"
            )));
        }
    };
    let Some(pixels) = data.pixels.get(..data.expected_len()) else {
        return Err(LumenError::invalid_argument(format!(
            "image buffer holds {} bytes, expected {}",
            data.pixels.len(),
            data.expected_len()
        )));
    };
    image::save_buffer(path, pixels, data.width, data.height, color)
        .map_err(|err| LumenError::parse(path.display().to_string(), err.to_string()))
}
