//! Render backend interface
//!
//! The landscape never talks to a graphics API. During traversal each level
//! hands its drawable chunks to a [`RenderBackend`] together with the
//! translation placing the chunk-local mesh in the world; uploading and
//! drawing are the backend's business.

use std::ops::AddAssign;

use glam::{Mat4, Vec3};

use crate::mesh::ChunkMesh;

/// One chunk submitted for drawing
#[derive(Clone, Copy, Debug)]
pub struct ChunkDraw<'a> {
    /// Detail level index, 0 = coarsest
    pub level: usize,
    pub center: Vec3,
    pub size_in_meters: f32,
    /// Chunk-local to world transform
    pub transform: Mat4,
    pub mesh: &'a ChunkMesh,
}

/// Consumer of chunk meshes
pub trait RenderBackend {
    fn draw(&mut self, draw: ChunkDraw<'_>);
}

/// Backend that discards everything; useful headless
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

impl RenderBackend for NullBackend {
    fn draw(&mut self, _draw: ChunkDraw<'_>) {}
}

/// Backend that records every draw, for inspection
#[derive(Clone, Debug, Default)]
pub struct RecordingBackend {
    pub draws: Vec<RecordedDraw>,
}

/// Owned summary of a [`ChunkDraw`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordedDraw {
    pub level: usize,
    pub center: Vec3,
    pub size_in_meters: f32,
    pub triangles: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws submitted by one level
    pub fn level(&self, level: usize) -> impl Iterator<Item = &RecordedDraw> {
        self.draws.iter().filter(move |d| d.level == level)
    }

    pub fn clear(&mut self) {
        self.draws.clear();
    }
}

impl RenderBackend for RecordingBackend {
    fn draw(&mut self, draw: ChunkDraw<'_>) {
        self.draws.push(RecordedDraw {
            level: draw.level,
            center: draw.center,
            size_in_meters: draw.size_in_meters,
            triangles: draw.mesh.triangle_count(),
        });
    }
}

/// Counters from one render traversal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Chunks submitted to the backend
    pub drawn: usize,
    /// Skipped because every block is air
    pub skipped_air: usize,
    /// Skipped because solid and enclosed by solid neighbours
    pub skipped_buried: usize,
    /// Visible slots whose chunk has no data yet
    pub pending: usize,
    /// Triangles submitted
    pub triangles: usize,
}

impl AddAssign for RenderStats {
    fn add_assign(&mut self, other: Self) {
        self.drawn += other.drawn;
        self.skipped_air += other.skipped_air;
        self.skipped_buried += other.skipped_buried;
        self.pending += other.pending;
        self.triangles += other.triangles;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let mut total = RenderStats::default();
        total += RenderStats { drawn: 2, triangles: 24, ..Default::default() };
        total += RenderStats { drawn: 1, skipped_air: 3, pending: 1, triangles: 12, ..Default::default() };

        assert_eq!(total.drawn, 3);
        assert_eq!(total.skipped_air, 3);
        assert_eq!(total.pending, 1);
        assert_eq!(total.triangles, 36);
    }

    #[test]
    fn test_recording_backend() {
        let mesh = ChunkMesh::with_capacity(0, 0);
        let mut backend = RecordingBackend::new();
        backend.draw(ChunkDraw {
            level: 1,
            center: Vec3::ONE,
            size_in_meters: 2.0,
            transform: Mat4::from_translation(Vec3::ONE),
            mesh: &mesh,
        });

        assert_eq!(backend.level(1).count(), 1);
        assert_eq!(backend.level(0).count(), 0);
        assert_eq!(backend.draws[0].triangles, 0);
    }
}
