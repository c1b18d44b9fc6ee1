//! Landscape streamer - the stack of detail levels around one observer

use glam::Vec3;

use crate::core::Result;
use crate::mesh::ChunkMeshBuilder;
use crate::render::{RenderBackend, RenderStats};
use crate::voxel::density::SharedOracle;
use crate::voxel::generation::GenerationScheduler;
use crate::voxel::pool::{ChunkPool, PoolStats};

use super::config::LandscapeConfig;
use super::grid::{DetailLevelGrid, GridUpdate};

/// Totals over all levels for one frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameUpdate {
    /// Levels whose window moved
    pub shifted_levels: usize,
    pub released: usize,
    pub generated: usize,
    pub aborted: usize,
    pub pending: usize,
}

impl FrameUpdate {
    fn add(&mut self, level: &GridUpdate) {
        self.shifted_levels += level.shifted() as usize;
        self.released += level.released;
        self.generated += level.generated;
        self.aborted += level.aborted;
        self.pending += level.pending;
    }
}

/// Nested detail levels sharing one chunk pool and one mesh builder.
///
/// Levels are kept coarsest first. Each frame they update in that order so
/// a level's hole is known before the finer level inside it checks
/// visibility.
pub struct LandscapeStreamer {
    levels: Vec<DetailLevelGrid>,
    pool: ChunkPool,
    builder: ChunkMeshBuilder,
    observer: Vec3,
    frame: u64,
}

impl LandscapeStreamer {
    pub fn new(config: LandscapeConfig, oracle: SharedOracle, observer: Vec3) -> Result<Self> {
        config.validate()?;

        let scheduler = GenerationScheduler::with_threads(config.generation_threads)?;
        let pool = ChunkPool::new(config.pool, oracle, scheduler)?;

        let levels = config
            .levels
            .iter()
            .enumerate()
            .map(|(lod, level)| DetailLevelGrid::new(lod, level.clone(), observer))
            .collect::<Result<Vec<_>>>()?;

        let mut streamer = Self {
            levels,
            pool,
            builder: ChunkMeshBuilder::new(),
            observer,
            frame: 0,
        };
        streamer.propagate_holes();

        log::info!(
            "Landscape streamer ready: {} levels, {}m to {}m chunks",
            streamer.levels.len(),
            config.levels.first().map_or(0.0, |l| l.chunk_size_meters),
            config.levels.last().map_or(0.0, |l| l.chunk_size_meters),
        );

        Ok(streamer)
    }

    /// Hand the hole of each level down to the finer level inside it
    fn propagate_holes(&mut self) {
        for index in 1..self.levels.len() {
            let bounds = self.levels[index - 1].hole_bounds();
            self.levels[index].set_bounding_volume(bounds);
        }
    }

    /// Move the observer and update every level, coarsest first
    pub fn update(&mut self, observer: Vec3) -> FrameUpdate {
        self.observer = observer;
        self.frame += 1;

        let mut frame = FrameUpdate::default();
        for index in 0..self.levels.len() {
            if index > 0 {
                let bounds = self.levels[index - 1].hole_bounds();
                self.levels[index].set_bounding_volume(bounds);
            }
            let update = self.levels[index].update(observer, &mut self.pool);
            frame.add(&update);
        }

        if frame.shifted_levels > 0 {
            log::debug!(
                "Frame {}: {} levels shifted, {} generated, {} released, {} pending",
                self.frame,
                frame.shifted_levels,
                frame.generated,
                frame.released,
                frame.pending
            );
        }
        frame
    }

    /// Draw every level through `backend`
    pub fn render(&mut self, backend: &mut dyn RenderBackend) -> RenderStats {
        let mut stats = RenderStats::default();
        for level in &mut self.levels {
            stats += level.render(&mut self.builder, backend);
        }
        stats
    }

    /// Release every chunk and empty the pool
    pub fn dispose(&mut self) {
        for level in &mut self.levels {
            level.dispose(&mut self.pool);
        }
        let stats = self.pool.stats();
        self.pool.dispose();
        log::info!(
            "Landscape disposed after {} frames ({} chunks created, {} recycled)",
            self.frame,
            stats.created,
            stats.recycled
        );
    }

    /// Detail levels, coarsest first
    pub fn levels(&self) -> &[DetailLevelGrid] {
        &self.levels
    }

    pub fn level(&self, lod: usize) -> Option<&DetailLevelGrid> {
        self.levels.get(lod)
    }

    pub fn pool(&self) -> &ChunkPool {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn observer(&self) -> Vec3 {
        self.observer
    }

    /// Updates run so far
    pub fn frame(&self) -> u64 {
        self.frame
    }
}
