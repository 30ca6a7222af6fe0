//! Chunk sampling: noise, island falloff and colour classification.

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::falloff::{FalloffCache, FalloffMask, FalloffParams};
use super::map_data::MapData;
use super::noise_field::{NoiseConfig, NoiseField};
use super::region::{self, TerrainType};
use super::CHUNK_SIZE;

/// Everything needed to turn a chunk centre into [`MapData`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub chunk_size: usize,
    pub noise: NoiseConfig,
    pub use_falloff: bool,
    pub falloff: FalloffParams,
    /// Height bands, ascending by threshold.
    pub regions: Vec<TerrainType>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            noise: NoiseConfig::default(),
            use_falloff: false,
            falloff: FalloffParams::default(),
            regions: region::default_regions(),
        }
    }
}

/// Produces [`MapData`] for chunks. Shared read-only between workers.
#[derive(Debug)]
pub struct TerrainSampler {
    config: SamplerConfig,
    falloff: Option<Arc<FalloffMask>>,
}

impl TerrainSampler {
    /// Build a sampler, taking the falloff mask from `cache` when enabled.
    pub fn new(config: SamplerConfig, cache: &FalloffCache) -> Self {
        if !region::is_sorted(&config.regions) {
            log::warn!("terrain regions are not sorted by threshold; classification is unspecified");
        }
        let falloff = config
            .use_falloff
            .then(|| cache.get_or_generate(config.chunk_size, config.falloff));
        Self { config, falloff }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn falloff(&self) -> Option<&FalloffMask> {
        self.falloff.as_deref()
    }

    /// Sample the chunk centred at `center`.
    ///
    /// The noise offset is `center + config.noise.offset`, so neighbouring
    /// centres sample contiguous noise. The falloff mask is applied in local
    /// chunk space and is identical for every chunk.
    pub fn sample(&self, center: Vec2) -> MapData {
        let size = self.config.chunk_size;
        let noise = self.config.noise.with_offset(center + self.config.noise.offset);
        let mut heights = NoiseField::generate(size, size, &noise);

        for y in 0..size {
            for x in 0..size {
                let mut h = *heights.get(x, y);
                if let Some(mask) = &self.falloff {
                    h -= mask.get(x, y);
                }
                heights.set(x, y, h.clamp(0.0, 1.0));
            }
        }

        let colors = region::classify_field(&heights, &self.config.regions);
        MapData::new(center, heights, colors)
    }
}
