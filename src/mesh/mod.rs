//! Height-field mesh synthesis

pub mod builder;

pub use builder::{MeshBuilder, MeshData, MeshVertex, lod_stride};
