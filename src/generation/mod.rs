//! Generation pipeline: settings plus the background scheduler that turns
//! chunk centres into map data, meshes and vegetation.

pub mod config;
pub mod scheduler;

pub use config::TerrainSettings;
pub use scheduler::{
    DrainReport, FailureHandler, GenerationFailure, GenerationScheduler, MapCallback, MeshCallback,
    RequestId, RequestKind,
};
