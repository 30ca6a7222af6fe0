//! Rule-based vegetation placement over a chunk's height field.

use glam::{Quat, Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::normals::{compute_normals, slope_degrees};
use super::rule::VegetationRule;
use crate::terrain::{ChunkKey, HeightCurve, MapData};

/// One placed vegetation instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Index of the rule that fired.
    pub rule: usize,
    pub prefab: String,
    /// Grid cell the placement came from.
    pub cell: (usize, usize),
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

/// Scatters vegetation using a height curve, world spread and global threshold.
#[derive(Clone, Debug)]
pub struct VegetationPlacer {
    pub height_multiplier: f32,
    pub height_curve: HeightCurve,
    /// World units per grid cell.
    pub spread_factor: f32,
    /// Global multiplier applied to every rule's density.
    pub placement_threshold: f32,
}

impl Default for VegetationPlacer {
    fn default() -> Self {
        Self {
            height_multiplier: 30.0,
            height_curve: HeightCurve::linear(),
            spread_factor: 10.0,
            placement_threshold: 0.6,
        }
    }
}

impl VegetationPlacer {
    /// Evaluate every rule on every interior cell of `map`.
    ///
    /// Border cells are never considered. Per cell and rule, one value is
    /// drawn for the density test; a placement then draws X jitter, Z jitter,
    /// scale and, for `random_yaw` rules, yaw, in that order.
    pub fn place<R: Rng>(
        &self,
        map: &MapData,
        rules: &[VegetationRule],
        rng: &mut R,
    ) -> Vec<Placement> {
        let heights = map.heights();
        let (width, height) = heights.dimensions();
        if width < 3 || height < 3 || rules.is_empty() {
            return Vec::new();
        }

        let normals = compute_normals(heights, self.height_multiplier);
        let spread = self.spread_factor;
        let half_x = (width - 1) as f32 / 2.0;
        let half_z = (height - 1) as f32 / 2.0;
        let center = map.center();
        let chunk_offset = chunk_world_origin(center, spread);

        let mut placements = Vec::new();
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let evaluated = self.height_curve.evaluate(*heights.get(x, y)) * self.height_multiplier;
                let slope = slope_degrees(*normals.get(x, y));

                for (index, rule) in rules.iter().enumerate() {
                    if !rule.accepts(evaluated, slope) {
                        continue;
                    }
                    if rng.random::<f32>() >= rule.density * self.placement_threshold {
                        continue;
                    }

                    let jitter = Vec3::new(
                        (rng.random::<f32>() - 0.5) * spread,
                        0.0,
                        (rng.random::<f32>() - 0.5) * spread,
                    );
                    let position = Vec3::new(
                        (x as f32 - half_x) * spread,
                        evaluated * spread,
                        (half_z - y as f32) * spread,
                    ) + chunk_offset
                        + jitter;

                    let scale = rng.random::<f32>() * (rule.max_scale - rule.min_scale) + rule.min_scale;
                    let rotation = if rule.random_yaw {
                        Quat::from_rotation_y(rng.random::<f32>() * std::f32::consts::TAU)
                    } else {
                        Quat::IDENTITY
                    };

                    placements.push(Placement {
                        rule: index,
                        prefab: rule.prefab.clone(),
                        cell: (x, y),
                        position,
                        rotation,
                        scale,
                    });
                }
            }
        }

        log::debug!(
            "Placed {} vegetation instances for chunk at ({}, {})",
            placements.len(),
            center.x,
            center.y
        );
        placements
    }
}

/// Deterministic generator for a chunk's vegetation.
pub fn chunk_rng(seed: i32, key: ChunkKey) -> ChaCha8Rng {
    let mut h = (key.x as u32 as u64).wrapping_mul(374761393)
        ^ (key.y as u32 as u64).wrapping_mul(668265263).rotate_left(32)
        ^ (seed as u32 as u64).wrapping_mul(1274126177);
    h = (h ^ (h >> 29)).wrapping_mul(0xBF58476D1CE4E5B9);
    h ^= h >> 32;
    ChaCha8Rng::seed_from_u64(h)
}

/// World-space XZ centre of a chunk's vegetation.
pub fn chunk_world_origin(center: Vec2, spread_factor: f32) -> Vec3 {
    Vec3::new(center.x * spread_factor, 0.0, center.y * spread_factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Grid;

    fn flat_map(size: usize, h: f32, center: Vec2) -> MapData {
        MapData::new(center, Grid::filled(size, size, h), Grid::filled(size, size, [1.0; 4]))
    }

    fn always_rule() -> VegetationRule {
        VegetationRule {
            min_height: 0.0,
            max_height: 1.0,
            density: 1.0,
            ..VegetationRule::new("grass", "grass_patch")
        }
    }

    fn unit_placer() -> VegetationPlacer {
        VegetationPlacer {
            height_multiplier: 1.0,
            height_curve: HeightCurve::linear(),
            spread_factor: 10.0,
            placement_threshold: 1.0,
        }
    }

    #[test]
    fn test_flat_field_fills_every_interior_cell() {
        let map = flat_map(5, 0.5, Vec2::ZERO);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let placements = unit_placer().place(&map, &[always_rule()], &mut rng);

        assert_eq!(placements.len(), 9);
        let mut cells: Vec<_> = placements.iter().map(|p| p.cell).collect();
        cells.sort();
        let expected: Vec<_> = (1..4).flat_map(|x| (1..4).map(move |y| (x, y))).collect();
        assert_eq!(cells, expected);
    }

    #[test]
    fn test_rules_layer_on_same_cell() {
        let map = flat_map(5, 0.5, Vec2::ZERO);
        let rules = vec![always_rule(), VegetationRule { prefab: "rock".into(), ..always_rule() }];
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let placements = unit_placer().place(&map, &rules, &mut rng);
        assert_eq!(placements.len(), 18);
        assert_eq!(placements.iter().filter(|p| p.rule == 1).count(), 9);
    }

    #[test]
    fn test_never_places_on_border() {
        let heights = Grid::from_fn(17, 17, |x, y| ((x * 7 + y * 3) % 11) as f32 / 10.0);
        let map = MapData::new(Vec2::ZERO, heights, Grid::filled(17, 17, [0.0; 4]));
        let rules = vec![VegetationRule {
            max_height: f32::MAX,
            max_slope_angle: 90.0,
            ..always_rule()
        }];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let placements = unit_placer().place(&map, &rules, &mut rng);
        assert_eq!(placements.len(), 15 * 15);
        for p in &placements {
            let (x, y) = p.cell;
            assert!(x > 0 && y > 0 && x < 16 && y < 16);
        }
    }

    #[test]
    fn test_height_and_slope_filters() {
        let map = flat_map(5, 0.5, Vec2::ZERO);
        let too_high = VegetationRule { min_height: 0.6, ..always_rule() };
        let too_steep = VegetationRule { min_slope_angle: 10.0, ..always_rule() };
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        assert!(unit_placer().place(&map, &[too_high, too_steep], &mut rng).is_empty());
    }

    #[test]
    fn test_zero_density_places_nothing() {
        let map = flat_map(5, 0.5, Vec2::ZERO);
        let rule = VegetationRule { density: 0.0, ..always_rule() };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(unit_placer().place(&map, &[rule], &mut rng).is_empty());
    }

    #[test]
    fn test_positions_stay_within_cell_jitter() {
        let center = Vec2::new(240.0, -240.0);
        let map = flat_map(5, 0.5, center);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let placer = unit_placer();
        for p in placer.place(&map, &[always_rule()], &mut rng) {
            let (x, y) = p.cell;
            let base = Vec3::new((x as f32 - 2.0) * 10.0, 5.0, (2.0 - y as f32) * 10.0)
                + chunk_world_origin(center, 10.0);
            assert!((p.position.x - base.x).abs() <= 5.0);
            assert!((p.position.z - base.z).abs() <= 5.0);
            assert!((p.position.y - base.y).abs() < 1e-4);
            assert!(p.scale >= 0.8 && p.scale <= 1.2);
            assert_eq!(p.rotation, Quat::IDENTITY);
        }
    }

    #[test]
    fn test_same_rng_same_placements() {
        let map = flat_map(9, 0.5, Vec2::ZERO);
        let rule = VegetationRule { density: 0.5, random_yaw: true, ..always_rule() };
        let key = map.key();
        let a = unit_placer().place(&map, std::slice::from_ref(&rule), &mut chunk_rng(7, key));
        let b = unit_placer().place(&map, std::slice::from_ref(&rule), &mut chunk_rng(7, key));
        assert_eq!(a, b);
    }

    #[test]
    fn test_chunk_rng_differs_per_chunk() {
        let mut a = chunk_rng(1, ChunkKey::new(0, 0));
        let mut b = chunk_rng(1, ChunkKey::new(240, 0));
        assert_ne!(a.random::<u64>(), b.random::<u64>());
    }
}
