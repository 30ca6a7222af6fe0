//! Core type aliases and re-exports

pub use glam::{Quat, Vec2, Vec3};

/// Standard Result type for the crate
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;

/// Linear RGBA colour, each channel in [0, 1].
pub type Rgba = [f32; 4];

/// Convert a linear colour to 8-bit RGBA.
#[inline]
pub fn rgba_to_u8(color: Rgba) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}
