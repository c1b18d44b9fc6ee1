//! Density oracle contract
//!
//! The landscape never decides what is solid itself. It asks a
//! [`DensityOracle`], either point by point or a whole chunk at a time, and
//! the batch form reports progress through a [`GenerationListener`] so long
//! running fills can be stopped cooperatively.

use std::sync::Arc;

use glam::Vec3;

use super::voxel::Voxel;

/// Oracle shared between the pool, the chunks and background workers
pub type SharedOracle = Arc<dyn DensityOracle>;

/// How a chunk fill ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Every sample was written
    Completed,
    /// Stopped early; the output buffer holds partial data
    Aborted,
}

/// Receives progress callbacks while a chunk is being filled.
pub trait GenerationListener {
    /// Called periodically with progress in 0.0-1.0.
    /// Return `false` to stop the fill.
    fn progress(&mut self, fraction: f32) -> bool;

    /// Called once when the fill finished.
    fn completed(&mut self);

    /// Called once when the fill stopped early.
    fn aborted(&mut self);
}

/// Regular grid of sample points covering one chunk
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleRegion {
    /// World-space center of the chunk
    pub center: Vec3,
    /// Samples along each axis
    pub points_per_axis: usize,
    /// Distance between neighbouring samples (the block size)
    pub spacing: f32,
}

impl SampleRegion {
    /// Total number of samples in the region
    pub fn point_count(&self) -> usize {
        self.points_per_axis * self.points_per_axis * self.points_per_axis
    }

    /// World position of the sample at local block coordinates.
    ///
    /// Samples sit at block centers, so the region is symmetric around `center`.
    pub fn sample_point(&self, x: usize, y: usize, z: usize) -> Vec3 {
        let half_extent = 0.5 * self.spacing * self.points_per_axis as f32;
        let local = (Vec3::new(x as f32, y as f32, z as f32) + 0.5) * self.spacing;
        self.center + local - Vec3::splat(half_extent)
    }
}

/// Source of voxel data for the landscape.
///
/// Must be a pure function of its inputs: the same point and scale always
/// yield the same answer, which is what makes regenerated chunks identical
/// to the ones that scrolled out.
pub trait DensityOracle: Send + Sync {
    /// Material at a world point, sampled at the given block size.
    fn classify(&self, world_pos: Vec3, sample_scale: f32) -> u8;

    /// Full voxel at a world point. Oracles that only know materials can
    /// rely on the default.
    fn sample(&self, world_pos: Vec3, sample_scale: f32) -> Voxel {
        Voxel::from_material(self.classify(world_pos, sample_scale))
    }

    /// Fill a whole region, x fastest then y then z.
    ///
    /// The default samples every point and polls the listener after each
    /// row of `points_per_axis` samples, stopping as soon as it asks to.
    fn fill_chunk(
        &self,
        region: &SampleRegion,
        out: &mut [Voxel],
        listener: &mut dyn GenerationListener,
    ) -> GenerationOutcome {
        let n = region.points_per_axis.max(1);
        let rows = out.len() / n;

        for (row_index, row) in out.chunks_mut(n).enumerate() {
            let y = row_index % n;
            let z = row_index / n;
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = self.sample(region.sample_point(x, y, z), region.spacing);
            }

            if !listener.progress((row_index + 1) as f32 / rows.max(1) as f32) {
                listener.aborted();
                return GenerationOutcome::Aborted;
            }
        }

        listener.completed();
        GenerationOutcome::Completed
    }
}

/// Oracle returning the same material everywhere
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformDensity(pub u8);

impl DensityOracle for UniformDensity {
    fn classify(&self, _world_pos: Vec3, _sample_scale: f32) -> u8 {
        self.0
    }
}

/// Oracle backed by a closure
pub struct FnDensity<F>(pub F);

impl<F> FnDensity<F>
where
    F: Fn(Vec3, f32) -> u8 + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> DensityOracle for FnDensity<F>
where
    F: Fn(Vec3, f32) -> u8 + Send + Sync,
{
    fn classify(&self, world_pos: Vec3, sample_scale: f32) -> u8 {
        (self.0)(world_pos, sample_scale)
    }
}
