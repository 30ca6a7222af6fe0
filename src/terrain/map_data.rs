//! Per-chunk generation output.

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Grid, Result, Rgba};

/// Identity of a chunk, derived from its centre coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub x: i32,
    pub y: i32,
}

impl ChunkKey {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Key for a chunk centre, rounded to the nearest grid unit.
    pub fn from_center(center: Vec2) -> Self {
        Self {
            x: center.x.round() as i32,
            y: center.y.round() as i32,
        }
    }
}

/// Normalized heights in [0, 1].
pub type HeightField = Grid<f32>;

/// Per-cell terrain colour, same dimensions as the height field.
pub type ColorField = Grid<Rgba>;

/// Height and colour fields for one chunk.
///
/// Immutable once built; clones share the underlying fields.
#[derive(Clone, Debug)]
pub struct MapData {
    center: Vec2,
    heights: Arc<HeightField>,
    colors: Arc<ColorField>,
}

impl MapData {
    /// # Panics
    ///
    /// Panics if the fields have different dimensions.
    pub fn new(center: Vec2, heights: HeightField, colors: ColorField) -> Self {
        assert_eq!(
            heights.dimensions(),
            colors.dimensions(),
            "height and colour fields must share dimensions"
        );
        Self {
            center,
            heights: Arc::new(heights),
            colors: Arc::new(colors),
        }
    }

    /// Like [`MapData::new`], but reports mismatched fields as an error.
    pub fn try_new(center: Vec2, heights: HeightField, colors: ColorField) -> Result<Self> {
        if heights.dimensions() != colors.dimensions() {
            return Err(Error::DimensionMismatch {
                expected: heights.dimensions(),
                actual: colors.dimensions(),
            });
        }
        Ok(Self::new(center, heights, colors))
    }

    /// Chunk centre the data was sampled at.
    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn heights(&self) -> &HeightField {
        &self.heights
    }

    pub fn colors(&self) -> &ColorField {
        &self.colors
    }

    pub fn size(&self) -> usize {
        self.heights.width()
    }

    pub fn key(&self) -> ChunkKey {
        ChunkKey::from_center(self.center)
    }
}
