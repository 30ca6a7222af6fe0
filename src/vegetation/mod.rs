//! Procedural vegetation.
//!
//! Vegetation is scattered per chunk from a [`MapData`](crate::terrain::MapData)
//! by evaluating [`VegetationRule`]s against terrain height and slope. The
//! resulting placements are owned by a [`VegetationStore`] keyed by chunk.

pub mod rule;
pub mod normals;
pub mod placer;
pub mod store;

pub use rule::{VegetationRule, default_rules};
pub use normals::{TerrainNormalField, compute_normals, slope_degrees};
pub use placer::{Placement, VegetationPlacer, chunk_rng};
pub use store::{ChunkVegetation, VegetationStore};
