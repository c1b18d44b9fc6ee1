//! Fixed-resolution cube of voxels placed in the world

use glam::{Mat4, Vec3};

use crate::mesh::{ChunkMesh, ChunkMeshBuilder};

use super::density::{GenerationOutcome, SampleRegion, SharedOracle};
use super::generation::{Dispatch, GenerationResult, GenerationScheduler, Homogeneity, PendingGeneration, Poll};
use super::voxel::Voxel;

/// Number of blocks along each side of a chunk.
/// Must be a power of two.
pub const CHUNK_SIZE: usize = 8;

/// log2 of [`CHUNK_SIZE`]
pub const CHUNK_SIZE_SHIFT: u32 = 3;

const CHUNK_SIZE_MASK: i32 = CHUNK_SIZE as i32 - 1;

const _: () = assert!(1 << CHUNK_SIZE_SHIFT == CHUNK_SIZE);

/// Number of blocks in a chunk
pub const BLOCK_COUNT: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// Default vertex color when no debug color is set
pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Flat block offset for chunk-local coordinates.
///
/// Coordinates wrap modulo [`CHUNK_SIZE`] through masking, so any `i32` is a
/// valid input (negative values wrap the non-negative way).
#[inline]
pub fn block_index(x: i32, y: i32, z: i32) -> usize {
    ((x & CHUNK_SIZE_MASK)
        | ((y & CHUNK_SIZE_MASK) << CHUNK_SIZE_SHIFT)
        | ((z & CHUNK_SIZE_MASK) << (CHUNK_SIZE_SHIFT * 2))) as usize
}

/// Density computation state of a chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationState {
    /// Never initialized, or returned to the pool
    Empty,
    /// Density computation in flight
    Generating,
    /// Voxel data and derived flags are valid
    Ready,
    /// Reset while generating; waiting for the task to stop
    CancelRequested,
    /// Stopped before finishing; holds no usable data
    Aborted,
}

fn new_block_buffer() -> Box<[Voxel]> {
    vec![Voxel::AIR; BLOCK_COUNT].into_boxed_slice()
}

/// Voxel data for one cube of the landscape plus its cached mesh
pub struct VoxelChunk {
    center: Vec3,
    size_in_meters: f32,
    blocks: Box<[Voxel]>,
    /// Second buffer handed to the next generation task
    spare: Option<Box<[Voxel]>>,
    all_solid: bool,
    all_air: bool,
    needs_mesh_rebuild: bool,
    state: GenerationState,
    /// Bumped on every initialize; results from older tasks are stale
    epoch: u64,
    pending: Option<PendingGeneration>,
    mesh: Option<ChunkMesh>,
    debug_color: [f32; 4],
}

impl VoxelChunk {
    /// Create an empty, uninitialized chunk
    pub fn new() -> Self {
        Self {
            center: Vec3::ZERO,
            size_in_meters: 1.0,
            blocks: new_block_buffer(),
            spare: None,
            all_solid: false,
            all_air: false,
            needs_mesh_rebuild: true,
            state: GenerationState::Empty,
            epoch: 0,
            pending: None,
            mesh: None,
            debug_color: WHITE,
        }
    }

    /// Place the chunk and compute its voxel data.
    ///
    /// Safe to call on a recycled chunk in any state: an outstanding task is
    /// cancelled and its late result ignored, and every derived flag is
    /// recomputed. With an inline scheduler the chunk is `Ready` (or
    /// `Aborted`) on return; with a pool it is `Generating` until polled.
    pub fn initialize(
        &mut self,
        center: Vec3,
        size_in_meters: f32,
        oracle: &SharedOracle,
        scheduler: &GenerationScheduler,
    ) {
        if let Some(previous) = self.pending.take() {
            previous.cancel();
        }

        self.epoch += 1;
        self.center = center;
        self.size_in_meters = size_in_meters;
        self.all_solid = false;
        self.all_air = false;
        self.needs_mesh_rebuild = true;
        self.state = GenerationState::Generating;

        let region = SampleRegion {
            center,
            points_per_axis: CHUNK_SIZE,
            spacing: self.block_size_in_meters(),
        };
        let buffer = self.spare.take().unwrap_or_else(new_block_buffer);

        match scheduler.dispatch(oracle, region, buffer, self.epoch) {
            Dispatch::Finished(result) => self.apply_result(result),
            Dispatch::Pending(pending) => self.pending = Some(pending),
        }
    }

    /// Pick up the result of a background generation, if it arrived.
    pub fn poll_generation(&mut self) -> GenerationState {
        let poll = match &self.pending {
            Some(pending) => pending.poll(),
            None => return self.state,
        };

        match poll {
            Poll::Pending => {}
            Poll::Finished(result) => {
                self.pending = None;
                self.apply_result(result);
            }
            Poll::Lost => {
                let epoch = self.pending.take().map_or(0, |pending| pending.epoch);
                log::warn!("Generation task {} for chunk at {:?} was lost", epoch, self.center);
                self.mark_aborted();
            }
        }
        self.state
    }

    fn apply_result(&mut self, result: GenerationResult) {
        let GenerationResult { epoch, outcome, blocks, homogeneity } = result;

        if epoch != self.epoch {
            log::trace!("Discarding stale generation {} (now {})", epoch, self.epoch);
            self.keep_spare(blocks);
            return;
        }

        let cancelled = self.state == GenerationState::CancelRequested;
        match outcome {
            GenerationOutcome::Completed if !cancelled => {
                let previous = std::mem::replace(&mut self.blocks, blocks);
                self.spare = Some(previous);
                self.all_solid = homogeneity.all_solid;
                self.all_air = homogeneity.all_air;
                self.needs_mesh_rebuild = true;
                self.state = GenerationState::Ready;
            }
            _ => {
                if !cancelled {
                    log::warn!("Oracle aborted generation of chunk at {:?}", self.center);
                }
                self.keep_spare(blocks);
                self.mark_aborted();
            }
        }
    }

    fn keep_spare(&mut self, blocks: Box<[Voxel]>) {
        if self.spare.is_none() {
            self.spare = Some(blocks);
        }
    }

    fn mark_aborted(&mut self) {
        self.all_solid = false;
        self.all_air = false;
        self.state = GenerationState::Aborted;
    }

    /// Prepare for return to the pool.
    ///
    /// Voxel data is left in place; the next initialize overwrites it.
    pub fn reset(&mut self) {
        self.needs_mesh_rebuild = true;
        self.debug_color = WHITE;
        match &self.pending {
            Some(pending) => {
                pending.cancel();
                self.state = GenerationState::CancelRequested;
            }
            None => self.state = GenerationState::Empty,
        }
    }

    /// Free the mesh and scratch buffer, and stop any running task
    pub fn dispose(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
        self.mesh = None;
        self.spare = None;
        self.state = GenerationState::Empty;
    }

    /// Voxel at chunk-local block coordinates, wrapped modulo [`CHUNK_SIZE`]
    pub fn sample(&self, x: i32, y: i32, z: i32) -> Voxel {
        self.blocks[block_index(x, y, z)]
    }

    /// Whether the block at chunk-local coordinates holds material
    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        self.sample(x, y, z).is_solid()
    }

    /// Material byte at chunk-local coordinates
    pub fn material(&self, x: i32, y: i32, z: i32) -> u8 {
        self.sample(x, y, z).material()
    }

    /// Overwrite one block of a ready chunk.
    ///
    /// Returns `false` (and changes nothing) while the chunk has no valid data.
    pub fn set_voxel(&mut self, x: i32, y: i32, z: i32, voxel: Voxel) -> bool {
        if self.state != GenerationState::Ready {
            return false;
        }
        self.blocks[block_index(x, y, z)] = voxel;

        let homogeneity = Homogeneity::scan(&self.blocks);
        self.all_solid = homogeneity.all_solid;
        self.all_air = homogeneity.all_air;
        self.needs_mesh_rebuild = true;
        true
    }

    /// True only for a ready chunk whose every block is solid
    pub fn is_all_solid(&self) -> bool {
        self.is_ready() && self.all_solid
    }

    /// True only for a ready chunk whose every block is air
    pub fn is_all_air(&self) -> bool {
        self.is_ready() && self.all_air
    }

    pub fn is_ready(&self) -> bool {
        self.state == GenerationState::Ready
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn needs_mesh_rebuild(&self) -> bool {
        self.needs_mesh_rebuild
    }

    /// World-space center
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Edge length of the chunk in world units
    pub fn size_in_meters(&self) -> f32 {
        self.size_in_meters
    }

    /// Edge length of one block in world units
    pub fn block_size_in_meters(&self) -> f32 {
        self.size_in_meters / CHUNK_SIZE as f32
    }

    /// Translation placing chunk-local mesh coordinates in the world
    pub fn transform(&self) -> Mat4 {
        Mat4::from_translation(self.center)
    }

    pub fn debug_color(&self) -> [f32; 4] {
        self.debug_color
    }

    /// Tint the mesh; takes effect at the next rebuild
    pub fn set_debug_color(&mut self, color: [f32; 4]) {
        if self.debug_color != color {
            self.debug_color = color;
            self.needs_mesh_rebuild = true;
        }
    }

    /// Mesh for the current voxel data, rebuilt when the data changed.
    ///
    /// `None` until the chunk is ready.
    pub fn mesh(&mut self, builder: &mut ChunkMeshBuilder) -> Option<&ChunkMesh> {
        if !self.is_ready() {
            return None;
        }

        if self.mesh.is_none() || self.needs_mesh_rebuild {
            let previous = self.mesh.take();
            let mesh = builder.build(self, previous);
            self.mesh = Some(mesh);
            self.needs_mesh_rebuild = false;
        }

        self.mesh.as_ref()
    }

    /// The mesh built last, without rebuilding
    pub fn cached_mesh(&self) -> Option<&ChunkMesh> {
        self.mesh.as_ref()
    }
}

impl Default for VoxelChunk {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VoxelChunk {
    fn drop(&mut self) {
        if let Some(pending) = &self.pending {
            pending.cancel();
        }
    }
}
