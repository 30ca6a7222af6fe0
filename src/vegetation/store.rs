//! Owned per-chunk vegetation sets.
//!
//! Each chunk's placements live under its [`ChunkKey`]. Placing vegetation
//! for a chunk again replaces its whole set; unloading removes it.

use std::collections::HashMap;

use glam::Vec2;

use super::placer::Placement;
use crate::terrain::ChunkKey;

/// Vegetation currently instantiated for one chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkVegetation {
    pub key: ChunkKey,
    pub center: Vec2,
    pub placements: Vec<Placement>,
    /// Incremented every time the chunk's set is replaced.
    pub revision: u32,
}

#[derive(Debug, Default)]
pub struct VegetationStore {
    chunks: HashMap<ChunkKey, ChunkVegetation>,
}

impl VegetationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `placements` for the chunk at `center`, returning the set it replaced.
    pub fn replace(&mut self, center: Vec2, placements: Vec<Placement>) -> Option<ChunkVegetation> {
        let key = ChunkKey::from_center(center);
        let revision = self.chunks.get(&key).map_or(0, |c| c.revision + 1);
        self.chunks.insert(
            key,
            ChunkVegetation {
                key,
                center,
                placements,
                revision,
            },
        )
    }

    /// Drop a chunk's vegetation, e.g. when the chunk unloads.
    pub fn remove(&mut self, key: ChunkKey) -> Option<ChunkVegetation> {
        self.chunks.remove(&key)
    }

    pub fn get(&self, key: ChunkKey) -> Option<&ChunkVegetation> {
        self.chunks.get(&key)
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.chunks.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkVegetation> {
        self.chunks.values()
    }

    /// Number of chunks with vegetation.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Placements across all chunks.
    pub fn total_placements(&self) -> usize {
        self.iter().map(|c| c.placements.len()).sum()
    }
}
