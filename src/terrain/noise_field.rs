//! Multi-octave coherent noise fields.
//!
//! Octave offsets come from a seeded ChaCha generator, so a given
//! [`NoiseConfig`] always produces the same field. Normalization is a pure
//! function of the raw sample and the per-call statistics, selected by
//! [`NormalizeMode`].

use glam::Vec2;
use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::Grid;

/// Smallest usable noise scale; anything at or below zero is clamped to this.
pub const MIN_SCALE: f32 = 0.0001;

/// Octave offsets are drawn from `[-OCTAVE_OFFSET_RANGE, OCTAVE_OFFSET_RANGE)`.
pub const OCTAVE_OFFSET_RANGE: i32 = 100_000;

/// Fraction of the theoretical amplitude sum that real Perlin sums reach.
/// Used to stretch globally normalized output over [0, 1].
pub const GLOBAL_RANGE_ESTIMATE: f32 = 0.9;

/// How raw accumulated noise is remapped to [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeMode {
    /// Remap from the observed min/max of a single call. Chunk edges do not
    /// line up across chunks.
    #[default]
    Local,
    /// Remap from a range estimated from the octave amplitudes. Continuous
    /// across chunks sharing seed and scale.
    Global,
}

/// Statistics gathered while accumulating a field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseStats {
    pub min: f32,
    pub max: f32,
    /// Sum of octave amplitudes, `sum(persistence^i)`.
    pub max_possible: f32,
}

impl NormalizeMode {
    /// Map one raw sample to the normalized range.
    pub fn normalize(self, raw: f32, stats: &NoiseStats) -> f32 {
        match self {
            NormalizeMode::Local => inverse_lerp(stats.min, stats.max, raw),
            NormalizeMode::Global => {
                let estimate = stats.max_possible * GLOBAL_RANGE_ESTIMATE;
                if estimate <= 0.0 {
                    return 0.0;
                }
                ((raw / estimate + 1.0) * 0.5).max(0.0)
            }
        }
    }
}

fn inverse_lerp(a: f32, b: f32, v: f32) -> f32 {
    if (b - a).abs() <= f32::EPSILON {
        return 0.0;
    }
    ((v - a) / (b - a)).clamp(0.0, 1.0)
}

/// Parameters for one noise generation call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub seed: i32,
    pub scale: f32,
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
    /// Offset in grid units, added to every octave's sample position.
    pub offset: Vec2,
    pub normalize_mode: NormalizeMode,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            scale: 50.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            offset: Vec2::ZERO,
            normalize_mode: NormalizeMode::Local,
        }
    }
}

impl NoiseConfig {
    /// Copy with out-of-range values clamped to safe defaults.
    pub fn sanitized(&self) -> Self {
        let mut cfg = self.clone();
        if !(cfg.scale > 0.0) {
            log::warn!("noise scale {} clamped to {}", cfg.scale, MIN_SCALE);
            cfg.scale = MIN_SCALE;
        }
        if !(cfg.lacunarity >= 1.0) {
            log::warn!("noise lacunarity {} clamped to 1", cfg.lacunarity);
            cfg.lacunarity = 1.0;
        }
        if !(0.0..=1.0).contains(&cfg.persistence) {
            let clamped = if cfg.persistence.is_nan() { 0.5 } else { cfg.persistence.clamp(0.0, 1.0) };
            log::warn!("noise persistence {} clamped to {}", cfg.persistence, clamped);
            cfg.persistence = clamped;
        }
        cfg
    }

    /// Same configuration sampled at a different offset.
    pub fn with_offset(&self, offset: Vec2) -> Self {
        Self { offset, ..self.clone() }
    }

    /// Theoretical maximum of the accumulated amplitude.
    pub fn max_possible_height(&self) -> f32 {
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        for _ in 0..self.octaves {
            sum += amplitude;
            amplitude *= self.persistence;
        }
        sum
    }
}

/// Deterministic fractal noise over a rectangular grid.
pub struct NoiseField;

impl NoiseField {
    /// Generate a `width x height` field normalized according to the config.
    ///
    /// Zero octaves yields a flat field of zeros.
    pub fn generate(width: usize, height: usize, config: &NoiseConfig) -> Grid<f32> {
        let config = config.sanitized();
        let (raw, stats) = Self::accumulate(width, height, &config);

        let mode = config.normalize_mode;
        Grid::from_fn(width, height, |x, y| mode.normalize(*raw.get(x, y), &stats))
    }

    /// Raw accumulated octave sums plus their statistics.
    pub fn accumulate(width: usize, height: usize, config: &NoiseConfig) -> (Grid<f32>, NoiseStats) {
        let octave_offsets = octave_offsets(config);
        let perlin = Perlin::new(config.seed as u32);

        let half_width = width as f32 / 2.0;
        let half_height = height as f32 / 2.0;

        let mut min = f32::MAX;
        let mut max = f32::MIN;

        let raw = Grid::from_fn(width, height, |x, y| {
            let mut amplitude = 1.0f32;
            let mut frequency = 1.0f32;
            let mut value = 0.0f32;

            for octave in &octave_offsets {
                let sample_x = (x as f32 - half_width + octave.x) / config.scale * frequency;
                let sample_y = (y as f32 - half_height + octave.y) / config.scale * frequency;

                let perlin_value = perlin.get([sample_x as f64, sample_y as f64]) as f32;
                value += perlin_value * amplitude;

                amplitude *= config.persistence;
                frequency *= config.lacunarity;
            }

            min = min.min(value);
            max = max.max(value);
            value
        });

        if width == 0 || height == 0 {
            min = 0.0;
            max = 0.0;
        }

        let stats = NoiseStats {
            min,
            max,
            max_possible: config.max_possible_height(),
        };
        (raw, stats)
    }
}

/// One offset per octave, drawn in order from a generator seeded by `config.seed`.
///
/// The world offset is folded in here: `+x` moves east and `+y` moves north,
/// which is towards decreasing grid rows.
fn octave_offsets(config: &NoiseConfig) -> Vec<Vec2> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed as i64 as u64);
    (0..config.octaves)
        .map(|_| {
            let ox = rng.random_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f32;
            let oy = rng.random_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f32;
            Vec2::new(ox + config.offset.x, oy - config.offset.y)
        })
        .collect()
}
