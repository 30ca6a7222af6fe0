//! Landmass - procedural island terrain generation
//!
//! Chunks are sampled from seeded fractal noise, shaped by a falloff mask,
//! classified into coloured height bands, meshed at a chosen level of
//! detail and populated with rule-driven vegetation. Heavy work runs on a
//! background pool; results come back through a per-frame drain.

pub mod core;
pub mod terrain;
pub mod mesh;
pub mod vegetation;
pub mod generation;
pub mod export;
