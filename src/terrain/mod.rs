//! Procedural terrain sampling

pub mod noise_field;
pub mod falloff;
pub mod curve;
pub mod region;
pub mod map_data;
pub mod sampler;

pub use noise_field::{NoiseConfig, NoiseField, NormalizeMode};
pub use falloff::{FalloffCache, FalloffMask, FalloffParams};
pub use curve::HeightCurve;
pub use region::TerrainType;
pub use map_data::{ChunkKey, ColorField, HeightField, MapData};
pub use sampler::{SamplerConfig, TerrainSampler};

/// Side length of a chunk's height field. `CHUNK_SIZE - 1 = 240` is divisible
/// by every mesh stride in {1, 2, 4, 6, 8, 10, 12}.
pub const CHUNK_SIZE: usize = 241;
