//! Landscape and detail level configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{ConfigError, Result};
use crate::voxel::chunk::CHUNK_SIZE;
use crate::voxel::pool::PoolConfig;

/// Shape of one detail level's grid
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailLevelConfig {
    /// Edge length of one chunk in meters
    pub chunk_size_meters: f32,
    /// Visible extent in chunks along each axis, hole included
    pub layer_size: u32,
    /// Chunks along each axis ceded to the next finer level (0 = no hole)
    pub hole_size: u32,
    /// Extra ring of retained off-screen chunks
    pub cache_margin: u32,
    /// Extra ring absorbing misalignment with the coarser level
    pub lod_margin: u32,
    /// Tint chunks in a per-level checkerboard
    pub debug_colors: bool,
}

impl Default for DetailLevelConfig {
    fn default() -> Self {
        Self {
            chunk_size_meters: 4.0,
            layer_size: 8,
            hole_size: 4,
            cache_margin: 1,
            lod_margin: 2,
            debug_colors: false,
        }
    }
}

impl DetailLevelConfig {
    /// Edge length of the backing array in chunks
    pub fn storage_size(&self) -> u32 {
        self.layer_size + 2 * self.cache_margin + 2 * self.lod_margin
    }

    /// Edge length of one block in meters
    pub fn block_size_meters(&self) -> f32 {
        self.chunk_size_meters / CHUNK_SIZE as f32
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.chunk_size_meters.is_finite() && self.chunk_size_meters > 0.0) {
            return Err(ConfigError::ChunkSize(self.chunk_size_meters));
        }
        if self.layer_size == 0 {
            return Err(ConfigError::EmptyLayer);
        }
        if self.hole_size >= self.layer_size {
            return Err(ConfigError::HoleTooLarge {
                hole: self.hole_size,
                layer: self.layer_size,
            });
        }
        Ok(())
    }
}

/// Full landscape setup
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandscapeConfig {
    /// Detail levels, coarsest first; the last one must have no hole
    pub levels: Vec<DetailLevelConfig>,
    /// Chunk pool bounds
    pub pool: PoolConfig,
    /// Background generation threads (0 = generate inline during update)
    pub generation_threads: usize,
}

impl Default for LandscapeConfig {
    fn default() -> Self {
        Self {
            levels: nested_levels(5, 0.5, 8, 4, 1),
            pool: PoolConfig::default(),
            generation_threads: 0,
        }
    }
}

/// Levels where each coarser chunk is `layer / hole` times the finer one,
/// so a level's hole spans the whole layer of the level inside it.
fn nested_levels(
    level_count: usize,
    finest_block_size: f32,
    layer_size: u32,
    hole_size: u32,
    cache_margin: u32,
) -> Vec<DetailLevelConfig> {
    let finest_chunk = finest_block_size * CHUNK_SIZE as f32;
    let (ratio, lod_margin) = if hole_size == 0 {
        (1.0, 0)
    } else {
        (layer_size as f32 / hole_size as f32, layer_size / hole_size)
    };

    (0..level_count)
        .map(|i| {
            let steps_from_finest = (level_count - 1 - i) as i32;
            let finest = steps_from_finest == 0;
            DetailLevelConfig {
                chunk_size_meters: finest_chunk * ratio.powi(steps_from_finest),
                layer_size,
                hole_size: if finest { 0 } else { hole_size },
                cache_margin,
                lod_margin,
                debug_colors: false,
            }
        })
        .collect()
}

impl LandscapeConfig {
    /// Build the classic nested stack, coarsest first.
    ///
    /// The finest chunk is `finest_block_size * CHUNK_SIZE` meters and has no
    /// hole; every coarser level scales chunk size by `layer_size / hole_size`.
    pub fn nested(
        level_count: usize,
        finest_block_size: f32,
        layer_size: u32,
        hole_size: u32,
        cache_margin: u32,
    ) -> Result<Self> {
        if level_count == 0 {
            return Err(ConfigError::NoDetailLevels.into());
        }
        if !(finest_block_size.is_finite() && finest_block_size > 0.0) {
            return Err(ConfigError::BlockSize(finest_block_size).into());
        }
        if level_count > 1 && (hole_size == 0 || layer_size <= hole_size) {
            return Err(ConfigError::NestingRatio { layer: layer_size, hole: hole_size }.into());
        }

        let config = Self {
            levels: nested_levels(level_count, finest_block_size, layer_size, hole_size, cache_margin),
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Same configuration with debug colouring switched on every level
    pub fn with_debug_colors(mut self, enabled: bool) -> Self {
        for level in &mut self.levels {
            level.debug_colors = enabled;
        }
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let Some(finest) = self.levels.last() else {
            return Err(ConfigError::NoDetailLevels);
        };

        for (index, level) in self.levels.iter().enumerate() {
            level.validate()?;
            if index > 0 {
                let previous = self.levels[index - 1].chunk_size_meters;
                if level.chunk_size_meters >= previous {
                    return Err(ConfigError::LevelOrder {
                        index,
                        size: level.chunk_size_meters,
                        previous,
                    });
                }
            }
        }

        if finest.hole_size != 0 {
            return Err(ConfigError::FinestLevelHole(finest.hole_size));
        }

        self.pool.validate()
    }

    /// Load and validate a JSON configuration
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        log::info!("Loaded landscape config from {:?} ({} levels)", path, config.levels.len());
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }
}
