//! Error types for terrain generation

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("level of detail {lod} (stride {stride}) does not evenly divide a {size}x{size} field")]
    InvalidLevelOfDetail { lod: u32, stride: usize, size: usize },

    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("height field is too small to build a mesh: {width}x{height}")]
    FieldTooSmall { width: usize, height: usize },

    #[error("generation worker failed: {0}")]
    Worker(String),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}
