//! Error types for the landscape

use thiserror::Error;

/// Main error type for the landscape
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Generation error: {0}")]
    Generation(String),
}

/// Rejected landscape, level or pool configuration.
///
/// Raised only at construction time; nothing is clamped silently.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("chunk size must be positive and finite, got {0}")]
    ChunkSize(f32),

    #[error("layer size must be at least one chunk")]
    EmptyLayer,

    #[error("hole size {hole} must be smaller than layer size {layer}")]
    HoleTooLarge { hole: u32, layer: u32 },

    #[error("the finest detail level cannot have a hole (hole size {0})")]
    FinestLevelHole(u32),

    #[error("at least one detail level is required")]
    NoDetailLevels,

    #[error("detail level {index} ({size}m) is not finer than the level before it ({previous}m)")]
    LevelOrder { index: usize, size: f32, previous: f32 },

    #[error("pool minimum {min} exceeds pool maximum {max}")]
    PoolBounds { min: usize, max: usize },

    #[error("block size must be positive and finite, got {0}")]
    BlockSize(f32),

    #[error("nesting needs layer size {layer} over hole size {hole} to exceed 1")]
    NestingRatio { layer: u32, hole: u32 },

    #[error("mesh shrink threshold must be within 0.0-1.0, got {0}")]
    ShrinkThreshold(f32),
}
