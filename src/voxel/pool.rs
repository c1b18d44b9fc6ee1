//! Chunk Pool - recycles chunks as they scroll in and out of view
//!
//! Chunks move by value: `acquire` hands out a boxed chunk, `release`
//! consumes it, so a chunk is owned either by exactly one grid slot or by the
//! pool, never both.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::{ConfigError, Result};

use super::chunk::VoxelChunk;
use super::density::SharedOracle;
use super::generation::GenerationScheduler;

/// Retention bounds for idle chunks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Chunks created up front
    pub min_retained: usize,
    /// Idle chunks kept; releases beyond this are disposed
    pub max_retained: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_retained: 64,
            max_retained: 4096,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.min_retained > self.max_retained {
            return Err(ConfigError::PoolBounds {
                min: self.min_retained,
                max: self.max_retained,
            });
        }
        Ok(())
    }
}

/// Lifetime counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Chunks allocated
    pub created: u64,
    /// Acquires served from retained chunks
    pub recycled: u64,
    /// Chunks handed back
    pub released: u64,
    /// Releases dropped because the pool was full
    pub disposed: u64,
}

/// Pool of reusable chunks, also the single place chunks get generated
pub struct ChunkPool {
    free: Vec<Box<VoxelChunk>>,
    config: PoolConfig,
    oracle: SharedOracle,
    scheduler: GenerationScheduler,
    stats: PoolStats,
}

impl ChunkPool {
    /// Create a pool pre-warmed with `config.min_retained` chunks
    pub fn new(config: PoolConfig, oracle: SharedOracle, scheduler: GenerationScheduler) -> Result<Self> {
        config.validate()?;

        let mut pool = Self {
            free: Vec::with_capacity(config.min_retained),
            config,
            oracle,
            scheduler,
            stats: PoolStats::default(),
        };

        for _ in 0..config.min_retained {
            pool.free.push(Box::new(VoxelChunk::new()));
        }
        pool.stats.created = config.min_retained as u64;

        log::info!(
            "Created chunk pool: {} pre-warmed, up to {} retained, {:?} generation",
            config.min_retained,
            config.max_retained,
            pool.scheduler
        );

        Ok(pool)
    }

    /// Take a recycled chunk, or allocate one if none are idle
    pub fn acquire(&mut self) -> Box<VoxelChunk> {
        match self.free.pop() {
            Some(chunk) => {
                self.stats.recycled += 1;
                chunk
            }
            None => {
                self.stats.created += 1;
                Box::new(VoxelChunk::new())
            }
        }
    }

    /// Hand a chunk back.
    ///
    /// The chunk is reset first; when the pool already holds
    /// `max_retained` idle chunks it is disposed instead of kept.
    pub fn release(&mut self, mut chunk: Box<VoxelChunk>) {
        chunk.reset();
        self.stats.released += 1;

        if self.free.len() < self.config.max_retained {
            self.free.push(chunk);
        } else {
            chunk.dispose();
            self.stats.disposed += 1;
            log::trace!("Pool full ({}), disposed released chunk", self.free.len());
        }
    }

    /// Acquire a chunk and start generating it at `center`
    pub fn generate(&mut self, center: Vec3, size_in_meters: f32) -> Box<VoxelChunk> {
        let mut chunk = self.acquire();
        chunk.initialize(center, size_in_meters, &self.oracle, &self.scheduler);
        log::trace!("Generating chunk at {:?} ({}m)", center, size_in_meters);
        chunk
    }

    /// Dispose every idle chunk
    pub fn dispose(&mut self) {
        for mut chunk in self.free.drain(..) {
            chunk.dispose();
        }
    }

    /// Idle chunks currently held
    pub fn retained(&self) -> usize {
        self.free.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    pub fn oracle(&self) -> &SharedOracle {
        &self.oracle
    }

    pub fn scheduler(&self) -> &GenerationScheduler {
        &self.scheduler
    }
}
