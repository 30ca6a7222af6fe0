//! Generation settings, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::terrain::{HeightCurve, SamplerConfig};
use crate::vegetation::{VegetationPlacer, VegetationRule, default_rules};

/// Configuration for the whole generation pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    /// Noise, falloff and region parameters for chunk sampling.
    pub terrain: SamplerConfig,
    /// World height of a normalized height of 1 after the curve.
    pub mesh_height_multiplier: f32,
    pub mesh_height_curve: HeightCurve,
    pub vegetation_rules: Vec<VegetationRule>,
    /// World units per grid cell for vegetation placement.
    pub vegetation_spread_factor: f32,
    /// Global multiplier on every rule's density.
    pub placement_threshold: f32,
    /// Place vegetation for every completed map-data request.
    pub auto_update_vegetation: bool,
    /// Worker threads for the scheduler; 0 picks one less than the core count.
    pub worker_threads: usize,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            terrain: SamplerConfig::default(),
            mesh_height_multiplier: 30.0,
            // Keeps water flat and lifts the highlands.
            mesh_height_curve: HeightCurve::new(vec![(0.0, 0.0), (0.4, 0.02), (1.0, 1.0)]),
            vegetation_rules: default_rules(),
            vegetation_spread_factor: 10.0,
            placement_threshold: 0.6,
            auto_update_vegetation: true,
            worker_threads: 0,
        }
    }
}

impl TerrainSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&json)?;
        log::info!("Loaded terrain settings from {}", path.display());
        Ok(settings)
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Copy with invalid numeric inputs clamped to safe values.
    pub fn sanitized(&self) -> Self {
        let mut settings = self.clone();
        settings.terrain.noise = settings.terrain.noise.sanitized();
        if settings.terrain.chunk_size < 2 {
            log::warn!("chunk size {} raised to 2", settings.terrain.chunk_size);
            settings.terrain.chunk_size = 2;
        }
        if !(settings.vegetation_spread_factor > 0.0) {
            log::warn!("vegetation spread factor {} reset to 1", settings.vegetation_spread_factor);
            settings.vegetation_spread_factor = 1.0;
        }
        if !(0.0..=1.0).contains(&settings.placement_threshold) {
            let clamped = if settings.placement_threshold.is_nan() {
                0.0
            } else {
                settings.placement_threshold.clamp(0.0, 1.0)
            };
            log::warn!("placement threshold {} clamped to {}", settings.placement_threshold, clamped);
            settings.placement_threshold = clamped;
        }
        settings.vegetation_rules = settings.vegetation_rules.iter().map(VegetationRule::sanitized).collect();
        settings
    }

    /// Placer configured from these settings.
    pub fn placer(&self) -> VegetationPlacer {
        VegetationPlacer {
            height_multiplier: self.mesh_height_multiplier,
            height_curve: self.mesh_height_curve.clone(),
            spread_factor: self.vegetation_spread_factor,
            placement_threshold: self.placement_threshold,
        }
    }

    /// Resolved worker thread count, at least 1.
    pub fn worker_thread_count(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }
}
