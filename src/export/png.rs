//! PNG encoding of height, colour, falloff and splat maps.
//!
//! Grid row `y` becomes image row `y`. Heights are expected in [0, 1] and
//! are clamped before quantizing to 8 bits.

use std::path::Path;

use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma, Rgba as Pixel, RgbaImage};
use image::codecs::png::PngEncoder;
use serde::{Deserialize, Serialize};

use crate::core::{Grid, Result, Rgba, rgba_to_u8};
use crate::terrain::FalloffMask;

/// Height bands for splatmap channels.
///
/// A height above `high` writes red, above `low` green, anything else blue.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplatThresholds {
    pub low: f32,
    pub high: f32,
}

impl Default for SplatThresholds {
    fn default() -> Self {
        Self { low: 0.25, high: 0.75 }
    }
}

impl SplatThresholds {
    /// Channel weights for one height, alpha always opaque.
    pub fn classify(&self, height: f32) -> [u8; 4] {
        if height > self.high {
            [255, 0, 0, 255]
        } else if height > self.low {
            [0, 255, 0, 255]
        } else {
            [0, 0, 255, 255]
        }
    }
}

#[inline]
fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Grayscale image of a height field.
pub fn height_image(heights: &Grid<f32>) -> GrayImage {
    GrayImage::from_fn(heights.width() as u32, heights.height() as u32, |x, y| {
        Luma([quantize(*heights.get(x as usize, y as usize))])
    })
}

/// RGBA image of a classified colour field.
pub fn color_image(colors: &Grid<Rgba>) -> RgbaImage {
    RgbaImage::from_fn(colors.width() as u32, colors.height() as u32, |x, y| {
        Pixel(rgba_to_u8(*colors.get(x as usize, y as usize)))
    })
}

/// Grayscale image of a falloff mask, white at the edges.
pub fn falloff_image(mask: &FalloffMask) -> GrayImage {
    height_image(mask.values())
}

pub fn splatmap_image(heights: &Grid<f32>, thresholds: SplatThresholds) -> RgbaImage {
    RgbaImage::from_fn(heights.width() as u32, heights.height() as u32, |x, y| {
        Pixel(thresholds.classify(*heights.get(x as usize, y as usize)))
    })
}

/// Encode raw pixel bytes as PNG.
pub fn encode_png(pixels: &[u8], width: u32, height: u32, color: ExtendedColorType) -> Result<Vec<u8>> {
    let mut png_data = Vec::new();
    let encoder = PngEncoder::new(&mut png_data);
    encoder.write_image(pixels, width, height, color)?;
    Ok(png_data)
}

fn write_png(path: &Path, pixels: &[u8], width: u32, height: u32, color: ExtendedColorType) -> Result<()> {
    let png_data = encode_png(pixels, width, height, color)?;
    std::fs::write(path, &png_data)?;
    log::debug!("Wrote {}x{} PNG to {} ({} bytes)", width, height, path.display(), png_data.len());
    Ok(())
}

pub fn save_height_map(path: impl AsRef<Path>, heights: &Grid<f32>) -> Result<()> {
    let img = height_image(heights);
    write_png(path.as_ref(), img.as_raw(), img.width(), img.height(), ExtendedColorType::L8)
}

pub fn save_color_map(path: impl AsRef<Path>, colors: &Grid<Rgba>) -> Result<()> {
    let img = color_image(colors);
    write_png(path.as_ref(), img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
}

pub fn save_falloff_map(path: impl AsRef<Path>, mask: &FalloffMask) -> Result<()> {
    let img = falloff_image(mask);
    write_png(path.as_ref(), img.as_raw(), img.width(), img.height(), ExtendedColorType::L8)
}

pub fn save_splatmap(path: impl AsRef<Path>, heights: &Grid<f32>, thresholds: SplatThresholds) -> Result<()> {
    let img = splatmap_image(heights, thresholds);
    write_png(path.as_ref(), img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
}
