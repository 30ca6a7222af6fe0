//! Terrain normals for slope tests.

use glam::Vec3;

use crate::core::Grid;

/// One unit normal per interior cell; border cells hold `Vec3::ZERO`.
pub type TerrainNormalField = Grid<Vec3>;

/// Central-difference normals over a height field.
///
/// Tangents span two cells: `(2, dh_x * m, 0)` and `(0, dh_y * m, 2)`.
/// The normal is oriented towards +Y, so flat ground has slope 0.
pub fn compute_normals(heights: &Grid<f32>, height_multiplier: f32) -> TerrainNormalField {
    let (width, height) = heights.dimensions();
    let mut normals = Grid::filled(width, height, Vec3::ZERO);

    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let left = *heights.get(x - 1, y);
            let right = *heights.get(x + 1, y);
            let up = *heights.get(x, y + 1);
            let down = *heights.get(x, y - 1);

            let tangent_x = Vec3::new(2.0, (right - left) * height_multiplier, 0.0).normalize();
            let tangent_y = Vec3::new(0.0, (up - down) * height_multiplier, 2.0).normalize();

            normals.set(x, y, tangent_y.cross(tangent_x).normalize());
        }
    }

    normals
}

/// Angle in degrees between `normal` and +Y.
pub fn slope_degrees(normal: Vec3) -> f32 {
    normal.dot(Vec3::Y).clamp(-1.0, 1.0).acos().to_degrees()
}
