//! Height-band classification into terrain colours.

use serde::{Deserialize, Serialize};

use crate::core::{Grid, Rgba};

/// Colour assigned to heights below every threshold.
pub const UNCLASSIFIED: Rgba = [0.0, 0.0, 0.0, 0.0];

/// One height band. Tables must be sorted by ascending `height`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainType {
    pub name: String,
    /// Lowest normalized height at which this band applies.
    pub height: f32,
    pub color: Rgba,
}

impl TerrainType {
    pub fn new(name: impl Into<String>, height: f32, color: Rgba) -> Self {
        Self {
            name: name.into(),
            height,
            color,
        }
    }
}

/// Water-to-snow palette.
pub fn default_regions() -> Vec<TerrainType> {
    vec![
        TerrainType::new("deep water", 0.0, [0.20, 0.38, 0.78, 1.0]),
        TerrainType::new("shallow water", 0.3, [0.21, 0.40, 0.82, 1.0]),
        TerrainType::new("sand", 0.4, [0.82, 0.82, 0.50, 1.0]),
        TerrainType::new("grass", 0.45, [0.34, 0.60, 0.10, 1.0]),
        TerrainType::new("forest", 0.55, [0.24, 0.42, 0.08, 1.0]),
        TerrainType::new("rock", 0.6, [0.35, 0.27, 0.24, 1.0]),
        TerrainType::new("high rock", 0.7, [0.29, 0.23, 0.22, 1.0]),
        TerrainType::new("snow", 0.9, [1.0, 1.0, 1.0, 1.0]),
    ]
}

/// Index of the band with the greatest threshold not exceeding `height`.
///
/// Scans in table order and stops at the first band above `height`, so an
/// unsorted table yields unspecified (but deterministic) results.
pub fn classify_index(height: f32, regions: &[TerrainType]) -> Option<usize> {
    let mut found = None;
    for (i, region) in regions.iter().enumerate() {
        if height >= region.height {
            found = Some(i);
        } else {
            break;
        }
    }
    found
}

/// Colour for a single height.
pub fn classify(height: f32, regions: &[TerrainType]) -> Rgba {
    classify_index(height, regions)
        .map(|i| regions[i].color)
        .unwrap_or(UNCLASSIFIED)
}

/// Colour field with the same dimensions as `heights`.
pub fn classify_field(heights: &Grid<f32>, regions: &[TerrainType]) -> Grid<Rgba> {
    Grid::from_fn(heights.width(), heights.height(), |x, y| {
        classify(*heights.get(x, y), regions)
    })
}

/// True if thresholds are in ascending order.
pub fn is_sorted(regions: &[TerrainType]) -> bool {
    regions.windows(2).all(|w| w[0].height <= w[1].height)
}
