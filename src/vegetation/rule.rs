//! Vegetation placement rules.

use serde::{Deserialize, Serialize};

/// Where and how often one kind of vegetation may appear.
///
/// Rules are evaluated independently per cell, so several rules can place
/// objects on the same cell (e.g. grass under a rock).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationRule {
    pub name: String,
    /// Opaque reference to the object the scene collaborator instantiates.
    pub prefab: String,
    /// Height range in world units, i.e. after curve and multiplier.
    pub min_height: f32,
    pub max_height: f32,
    /// Chance to place per eligible cell, 0-1.
    pub density: f32,
    /// Slope range in degrees from horizontal.
    pub min_slope_angle: f32,
    pub max_slope_angle: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    /// Rotate each placement by a random angle about +Y.
    pub random_yaw: bool,
}

impl Default for VegetationRule {
    fn default() -> Self {
        Self {
            name: String::new(),
            prefab: String::new(),
            min_height: 0.0,
            max_height: f32::MAX,
            density: 0.5,
            min_slope_angle: 0.0,
            max_slope_angle: 45.0,
            min_scale: 0.8,
            max_scale: 1.2,
            random_yaw: false,
        }
    }
}

impl VegetationRule {
    pub fn new(name: impl Into<String>, prefab: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefab: prefab.into(),
            ..Default::default()
        }
    }

    /// Copy with density clamped to [0, 1] and inverted ranges swapped.
    pub fn sanitized(&self) -> Self {
        let mut rule = self.clone();
        if !(0.0..=1.0).contains(&rule.density) {
            let clamped = if rule.density.is_nan() { 0.0 } else { rule.density.clamp(0.0, 1.0) };
            log::warn!("vegetation rule '{}': density {} clamped to {}", rule.name, rule.density, clamped);
            rule.density = clamped;
        }
        if rule.min_height > rule.max_height {
            log::warn!("vegetation rule '{}': height range inverted, swapping", rule.name);
            std::mem::swap(&mut rule.min_height, &mut rule.max_height);
        }
        if rule.min_slope_angle > rule.max_slope_angle {
            log::warn!("vegetation rule '{}': slope range inverted, swapping", rule.name);
            std::mem::swap(&mut rule.min_slope_angle, &mut rule.max_slope_angle);
        }
        if rule.min_scale > rule.max_scale {
            std::mem::swap(&mut rule.min_scale, &mut rule.max_scale);
        }
        rule
    }

    /// True if a cell with this height and slope may hold this vegetation.
    pub fn accepts(&self, evaluated_height: f32, slope_degrees: f32) -> bool {
        evaluated_height >= self.min_height
            && evaluated_height <= self.max_height
            && slope_degrees >= self.min_slope_angle
            && slope_degrees <= self.max_slope_angle
    }
}

/// Grass on gentle lowland slopes, trees a bit higher, rocks anywhere steep.
pub fn default_rules() -> Vec<VegetationRule> {
    vec![
        VegetationRule {
            min_height: 6.0,
            max_height: 14.0,
            density: 0.6,
            max_slope_angle: 30.0,
            ..VegetationRule::new("grass", "grass_patch")
        },
        VegetationRule {
            min_height: 8.0,
            max_height: 18.0,
            density: 0.15,
            max_slope_angle: 25.0,
            min_scale: 0.9,
            max_scale: 1.4,
            random_yaw: true,
            ..VegetationRule::new("pine", "pine_tree")
        },
        VegetationRule {
            min_height: 4.0,
            max_height: 30.0,
            density: 0.05,
            min_slope_angle: 20.0,
            max_slope_angle: 70.0,
            random_yaw: true,
            ..VegetationRule::new("boulder", "rock_large")
        },
    ]
}
