//! Toroidal chunk window for one detail level
//!
//! The grid is a fixed `storage_size³` array of chunk slots centered on the
//! observer's chunk. When the observer crosses a chunk boundary the window is
//! shifted by index translation: chunks that are still in range move to their
//! new slot, the rest go back to the pool. Slot `(x, y, z)` always holds the
//! chunk at world chunk coordinate `center + (x, y, z) - storage_size / 2`.
//!
//! Three independent rules decide whether a slot is visible:
//! - it lies inside the layer, not in the cache or lod margin rings
//! - its center lies inside the bounding volume set by the coarser level
//! - it is not part of this level's hole, which the finer level fills in

use glam::{DVec3, I64Vec3, Mat4, Vec3};

use crate::core::Result;
use crate::math::Aabb;
use crate::mesh::ChunkMeshBuilder;
use crate::render::{ChunkDraw, RenderBackend, RenderStats};
use crate::voxel::chunk::{GenerationState, VoxelChunk};
use crate::voxel::pool::ChunkPool;

use super::config::DetailLevelConfig;

type Slot = Option<Box<VoxelChunk>>;

const NEIGHBOURS: [I64Vec3; 6] = [
    I64Vec3::new(-1, 0, 0),
    I64Vec3::new(1, 0, 0),
    I64Vec3::new(0, -1, 0),
    I64Vec3::new(0, 1, 0),
    I64Vec3::new(0, 0, -1),
    I64Vec3::new(0, 0, 1),
];

/// What one [`DetailLevelGrid::update`] did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridUpdate {
    /// Chunk coordinate change applied this update (zero when settled)
    pub delta: I64Vec3,
    /// The jump was too large to shift and every slot was cleared
    pub teleported: bool,
    /// Chunks returned to the pool
    pub released: usize,
    /// Chunks requested from the pool
    pub generated: usize,
    /// Generations that ended without data; retried next update
    pub aborted: usize,
    /// Generations still running after this update
    pub pending: usize,
}

impl GridUpdate {
    pub fn shifted(&self) -> bool {
        self.delta != I64Vec3::ZERO
    }
}

/// Snapshot of grid occupancy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridStats {
    /// Slots holding a chunk
    pub occupied: usize,
    /// Occupied slots still generating
    pub pending: usize,
    /// Occupied slots with data
    pub ready: usize,
    /// Delta of the most recent shift
    pub last_shift: I64Vec3,
}

/// Largest chunk coordinate magnitude the grid addresses. Leaves headroom
/// so slot offsets and shift deltas never overflow `i64`.
pub const CHUNK_COORD_LIMIT: i64 = i64::MAX / 4;

/// Chunk coordinate containing a world position, clamped to
/// `±CHUNK_COORD_LIMIT` on every axis
pub fn chunk_coord(world_pos: Vec3, chunk_size: f32) -> I64Vec3 {
    let limit = I64Vec3::splat(CHUNK_COORD_LIMIT);
    (world_pos.as_dvec3() / chunk_size as f64)
        .floor()
        .as_i64vec3()
        .clamp(-limit, limit)
}

/// World-space center of the chunk at a chunk coordinate
pub fn chunk_center(coord: I64Vec3, chunk_size: f32) -> Vec3 {
    ((coord.as_dvec3() + DVec3::splat(0.5)) * chunk_size as f64).as_vec3()
}

/// Checkerboard tints for one level, derived from its chunk size
fn level_debug_colors(chunk_size: f32) -> [[f32; 4]; 2] {
    let s = chunk_size;
    let base = [1.0 - s / (s + 10.0), 0.5, s / (s + 100.0), 1.0];
    let light = base.map(|c| c + (1.0 - c) * 0.25);
    [base, light]
}

/// One detail level: a window of chunks that follows the observer
pub struct DetailLevelGrid {
    lod: usize,
    config: DetailLevelConfig,
    storage_size: i64,
    slots: Vec<Slot>,
    /// Second slot array, swapped in after a shift
    scratch: Vec<Slot>,
    center_chunk: I64Vec3,
    bounding_volume: Option<Aabb>,
    hole_bounds: Option<Aabb>,
    needs_fill: bool,
    last_shift: I64Vec3,
    debug_colors: Option<[[f32; 4]; 2]>,
}

impl DetailLevelGrid {
    /// Create an empty grid centered on `observer`.
    ///
    /// Nothing is generated until the first [`Self::update`].
    pub fn new(lod: usize, config: DetailLevelConfig, observer: Vec3) -> Result<Self> {
        config.validate()?;

        let storage_size = config.storage_size() as i64;
        let slot_count = (storage_size * storage_size * storage_size) as usize;
        let debug_colors = config.debug_colors.then(|| level_debug_colors(config.chunk_size_meters));

        let mut grid = Self {
            lod,
            storage_size,
            slots: std::iter::repeat_with(|| None).take(slot_count).collect(),
            scratch: std::iter::repeat_with(|| None).take(slot_count).collect(),
            center_chunk: chunk_coord(observer, config.chunk_size_meters),
            bounding_volume: None,
            hole_bounds: None,
            needs_fill: true,
            last_shift: I64Vec3::ZERO,
            debug_colors,
            config,
        };
        grid.hole_bounds = grid.compute_hole_bounds();

        log::info!(
            "Detail level {}: {}m chunks, layer {}, hole {}, {}³ slots",
            lod,
            grid.config.chunk_size_meters,
            grid.config.layer_size,
            grid.config.hole_size,
            storage_size
        );

        Ok(grid)
    }

    /// Follow the observer: collect finished generations, shift the window
    /// if the observer changed chunk, then generate every visible empty slot.
    ///
    /// The hole is recomputed before this returns, so a caller can forward
    /// [`Self::hole_bounds`] to the next finer level in the same frame.
    pub fn update(&mut self, observer: Vec3, pool: &mut ChunkPool) -> GridUpdate {
        let mut result = GridUpdate::default();

        let (released, aborted) = self.collect_generations(pool);
        result.released += released;
        result.aborted += aborted;

        let new_center = chunk_coord(observer, self.config.chunk_size_meters);
        let delta = new_center - self.center_chunk;
        if delta != I64Vec3::ZERO {
            self.center_chunk = new_center;
            self.hole_bounds = self.compute_hole_bounds();

            let (released, teleported) = self.shift(delta, pool);
            result.released += released;
            result.teleported = teleported;
            result.delta = delta;
            self.last_shift = delta;
            self.needs_fill = true;

            log::debug!(
                "Level {} shifted by {:?} to {:?}: {} released{}",
                self.lod,
                delta,
                new_center,
                released,
                if teleported { " (teleport)" } else { "" }
            );
        }

        if self.needs_fill {
            let (generated, aborted) = self.generate_missing_chunks(pool);
            result.generated += generated;
            result.aborted += aborted;
            self.needs_fill = aborted > 0;
        }

        result.pending = self.pending_count();
        result
    }

    /// Pick up background results; aborted chunks go back to the pool.
    fn collect_generations(&mut self, pool: &mut ChunkPool) -> (usize, usize) {
        let mut released = 0;
        let mut aborted = 0;

        for slot in &mut self.slots {
            let state = match slot.as_deref_mut() {
                Some(chunk) => chunk.poll_generation(),
                None => continue,
            };
            if state == GenerationState::Aborted {
                if let Some(chunk) = slot.take() {
                    log::trace!("Chunk at {:?} aborted, slot will be retried", chunk.center());
                    pool.release(chunk);
                    released += 1;
                    aborted += 1;
                }
            }
        }

        if aborted > 0 {
            self.needs_fill = true;
        }
        (released, aborted)
    }

    /// Move every chunk by `-delta` slots, releasing those that fall off.
    ///
    /// Returns the number released and whether the jump cleared the grid.
    fn shift(&mut self, delta: I64Vec3, pool: &mut ChunkPool) -> (usize, bool) {
        let s = self.storage_size;

        if delta.abs().max_element() >= s {
            let mut released = 0;
            for slot in &mut self.slots {
                if let Some(chunk) = slot.take() {
                    pool.release(chunk);
                    released += 1;
                }
            }
            return (released, true);
        }

        for (dest, coord) in slot_coords(s).enumerate() {
            let source = coord + delta;
            if in_storage(source, s) {
                self.scratch[dest] = self.slots[slot_index(source, s)].take();
            }
        }

        let mut released = 0;
        for slot in &mut self.slots {
            if let Some(chunk) = slot.take() {
                log::trace!("Chunk at {:?} scrolled out", chunk.center());
                pool.release(chunk);
                released += 1;
            }
        }

        std::mem::swap(&mut self.slots, &mut self.scratch);
        (released, false)
    }

    /// Request a chunk for every visible slot that has none.
    ///
    /// Returns how many were requested and how many aborted immediately.
    fn generate_missing_chunks(&mut self, pool: &mut ChunkPool) -> (usize, usize) {
        let mut generated = 0;
        let mut aborted = 0;

        for (index, coord) in slot_coords(self.storage_size).enumerate() {
            if self.slots[index].is_some() || !self.is_visible(coord) {
                continue;
            }

            let world_chunk = self.world_chunk(coord);
            let mut chunk = pool.generate(
                chunk_center(world_chunk, self.config.chunk_size_meters),
                self.config.chunk_size_meters,
            );
            generated += 1;

            if chunk.state() == GenerationState::Aborted {
                pool.release(chunk);
                aborted += 1;
                continue;
            }

            if let Some([even, odd]) = self.debug_colors {
                let parity = (world_chunk.x + world_chunk.y + world_chunk.z).rem_euclid(2);
                chunk.set_debug_color(if parity == 0 { even } else { odd });
            }
            self.slots[index] = Some(chunk);
        }

        if generated > 0 {
            log::trace!("Level {} requested {} chunks", self.lod, generated);
        }
        (generated, aborted)
    }

    /// Submit every drawable chunk to `backend`.
    ///
    /// All-air chunks and solid chunks enclosed by solid neighbours are
    /// skipped without meshing.
    pub fn render(&mut self, builder: &mut ChunkMeshBuilder, backend: &mut dyn RenderBackend) -> RenderStats {
        let mut stats = RenderStats::default();

        for (index, coord) in slot_coords(self.storage_size).enumerate() {
            if self.slots[index].is_none() || !self.is_visible(coord) {
                continue;
            }

            let buried = self.is_buried(coord);
            let Some(chunk) = self.slots[index].as_deref_mut() else {
                continue;
            };

            if !chunk.is_ready() {
                stats.pending += 1;
                continue;
            }
            if chunk.is_all_air() {
                stats.skipped_air += 1;
                continue;
            }
            if chunk.is_all_solid() && buried {
                stats.skipped_buried += 1;
                continue;
            }

            let center = chunk.center();
            let size_in_meters = chunk.size_in_meters();
            let transform: Mat4 = chunk.transform();
            if let Some(mesh) = chunk.mesh(builder) {
                stats.drawn += 1;
                stats.triangles += mesh.triangle_count();
                backend.draw(ChunkDraw {
                    level: self.lod,
                    center,
                    size_in_meters,
                    transform,
                    mesh,
                });
            }
        }

        stats
    }

    /// Whether all six neighbours of a slot hold solid matter.
    ///
    /// Slots outside the grid and empty slots count as solid; a neighbour
    /// that is still generating does not. Empty slots include the hole, which
    /// the finer level covers with its own closed chunk meshes, so a solid
    /// chunk facing the hole is hidden behind them.
    pub fn is_buried(&self, coord: I64Vec3) -> bool {
        NEIGHBOURS.iter().all(|offset| {
            let neighbour = coord + *offset;
            if !in_storage(neighbour, self.storage_size) {
                return true;
            }
            match &self.slots[slot_index(neighbour, self.storage_size)] {
                Some(chunk) => chunk.is_all_solid(),
                None => true,
            }
        })
    }

    /// Whether a slot may be generated and drawn
    pub fn is_visible(&self, coord: I64Vec3) -> bool {
        let margin = (self.config.cache_margin + self.config.lod_margin) as i64;
        let ring_end = self.storage_size - margin;
        if coord.cmplt(I64Vec3::splat(margin)).any() || coord.cmpge(I64Vec3::splat(ring_end)).any() {
            return false;
        }

        if let Some(bounds) = &self.bounding_volume {
            let center = chunk_center(self.world_chunk(coord), self.config.chunk_size_meters);
            if !bounds.contains(center) {
                return false;
            }
        }

        !self.in_hole(coord)
    }

    /// Whether a slot lies in the region ceded to the finer level
    pub fn in_hole(&self, coord: I64Vec3) -> bool {
        let hole = self.config.hole_size as i64;
        if hole == 0 {
            return false;
        }
        let start = self.hole_start();
        coord.cmpge(I64Vec3::splat(start)).all() && coord.cmplt(I64Vec3::splat(start + hole)).all()
    }

    fn hole_start(&self) -> i64 {
        self.storage_size / 2 - self.config.hole_size as i64 / 2
    }

    fn compute_hole_bounds(&self) -> Option<Aabb> {
        let hole = self.config.hole_size as i64;
        if hole == 0 {
            return None;
        }
        let first = self.world_chunk(I64Vec3::splat(self.hole_start()));
        Some(Aabb::from_chunks(first, hole, self.config.chunk_size_meters))
    }

    /// World chunk coordinate held by a slot
    pub fn world_chunk(&self, coord: I64Vec3) -> I64Vec3 {
        self.center_chunk + coord - I64Vec3::splat(self.storage_size / 2)
    }

    /// World-space center of the chunk a slot holds
    pub fn slot_center(&self, coord: I64Vec3) -> Vec3 {
        chunk_center(self.world_chunk(coord), self.config.chunk_size_meters)
    }

    /// Restrict generation and drawing to a box, normally the coarser
    /// level's hole. `None` lifts the restriction.
    pub fn set_bounding_volume(&mut self, bounds: Option<Aabb>) {
        if self.bounding_volume != bounds {
            self.bounding_volume = bounds;
            self.needs_fill = true;
        }
    }

    pub fn bounding_volume(&self) -> Option<Aabb> {
        self.bounding_volume
    }

    /// Box this level leaves empty for the finer level; `None` without a hole
    pub fn hole_bounds(&self) -> Option<Aabb> {
        self.hole_bounds
    }

    /// Release every chunk to the pool
    pub fn dispose(&mut self, pool: &mut ChunkPool) {
        let mut released = 0;
        for slot in self.slots.iter_mut().chain(self.scratch.iter_mut()) {
            if let Some(chunk) = slot.take() {
                pool.release(chunk);
                released += 1;
            }
        }
        self.needs_fill = true;
        log::debug!("Level {} disposed, {} chunks released", self.lod, released);
    }

    /// Chunk in a slot, if any
    pub fn chunk_at(&self, coord: I64Vec3) -> Option<&VoxelChunk> {
        if !in_storage(coord, self.storage_size) {
            return None;
        }
        self.slots[slot_index(coord, self.storage_size)].as_deref()
    }

    /// Every occupied slot with its chunk
    pub fn chunks(&self) -> impl Iterator<Item = (I64Vec3, &VoxelChunk)> {
        slot_coords(self.storage_size)
            .zip(self.slots.iter())
            .filter_map(|(coord, slot)| slot.as_deref().map(|chunk| (coord, chunk)))
    }

    fn pending_count(&self) -> usize {
        self.chunks()
            .filter(|(_, chunk)| chunk.state() == GenerationState::Generating)
            .count()
    }

    pub fn stats(&self) -> GridStats {
        let mut stats = GridStats {
            last_shift: self.last_shift,
            ..Default::default()
        };
        for (_, chunk) in self.chunks() {
            stats.occupied += 1;
            match chunk.state() {
                GenerationState::Generating => stats.pending += 1,
                GenerationState::Ready => stats.ready += 1,
                _ => {}
            }
        }
        stats
    }

    pub fn lod(&self) -> usize {
        self.lod
    }

    pub fn config(&self) -> &DetailLevelConfig {
        &self.config
    }

    pub fn storage_size(&self) -> usize {
        self.storage_size as usize
    }

    /// World chunk coordinate the window is centered on
    pub fn center_chunk(&self) -> I64Vec3 {
        self.center_chunk
    }

    pub fn chunk_size_meters(&self) -> f32 {
        self.config.chunk_size_meters
    }
}

#[inline]
fn in_storage(coord: I64Vec3, storage_size: i64) -> bool {
    coord.cmpge(I64Vec3::ZERO).all() && coord.cmplt(I64Vec3::splat(storage_size)).all()
}

#[inline]
fn slot_index(coord: I64Vec3, storage_size: i64) -> usize {
    (coord.x + storage_size * (coord.y + storage_size * coord.z)) as usize
}

/// Slot coordinates in storage order, x fastest
fn slot_coords(storage_size: i64) -> impl Iterator<Item = I64Vec3> {
    (0..storage_size).flat_map(move |z| {
        (0..storage_size).flat_map(move |y| (0..storage_size).map(move |x| I64Vec3::new(x, y, z)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingBackend;
    use crate::voxel::chunk::CHUNK_SIZE;
    use crate::voxel::density::{FnDensity, SharedOracle, UniformDensity};
    use crate::voxel::generation::GenerationScheduler;
    use crate::voxel::pool::PoolConfig;
    use crate::voxel::voxel::AIR_MATERIAL;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn level(chunk_size_meters: f32, layer_size: u32, hole_size: u32) -> DetailLevelConfig {
        DetailLevelConfig {
            chunk_size_meters,
            layer_size,
            hole_size,
            cache_margin: 1,
            lod_margin: 1,
            debug_colors: false,
        }
    }

    /// Ground plane at y = 0
    fn ground() -> SharedOracle {
        Arc::new(FnDensity(|p: Vec3, _: f32| if p.y < 0.0 { 1 } else { AIR_MATERIAL }))
    }

    /// Rolling hills crossing the grid's y range
    fn hills() -> SharedOracle {
        Arc::new(FnDensity(|p: Vec3, _: f32| {
            let height = (p.x * 0.3).sin() * 3.0 + (p.z * 0.2).cos() * 2.0;
            (p.y < height) as u8
        }))
    }

    fn pool(oracle: SharedOracle) -> ChunkPool {
        ChunkPool::new(PoolConfig { min_retained: 0, max_retained: 10_000 }, oracle, GenerationScheduler::Inline)
            .unwrap()
    }

    fn visible_centers(grid: &DetailLevelGrid) -> HashSet<[i64; 3]> {
        grid.chunks()
            .filter(|(coord, _)| grid.is_visible(*coord))
            .map(|(coord, _)| grid.world_chunk(coord).to_array())
            .collect()
    }

    fn visible_slot_count(grid: &DetailLevelGrid) -> usize {
        slot_coords(grid.storage_size).filter(|c| grid.is_visible(*c)).count()
    }

    #[test]
    fn test_chunk_coord_floors() {
        assert_eq!(chunk_coord(Vec3::new(0.0, 7.9, -0.1), 8.0), I64Vec3::new(0, 0, -1));
        assert_eq!(chunk_coord(Vec3::new(-8.0, 8.0, -8.1), 8.0), I64Vec3::new(-1, 1, -2));
        assert_eq!(chunk_center(I64Vec3::new(-1, 0, 2), 8.0), Vec3::new(-4.0, 4.0, 20.0));
    }

    #[test]
    fn test_rejects_hole_as_large_as_layer() {
        assert!(DetailLevelGrid::new(0, level(1.0, 4, 4), Vec3::ZERO).is_err());
        assert!(DetailLevelGrid::new(0, level(-1.0, 4, 0), Vec3::ZERO).is_err());
    }

    #[test]
    fn test_first_update_fills_visible_slots() {
        let mut pool = pool(ground());
        let mut grid = DetailLevelGrid::new(0, level(1.0, 4, 0), Vec3::ZERO).unwrap();
        assert_eq!(grid.stats().occupied, 0);

        let update = grid.update(Vec3::ZERO, &mut pool);
        assert!(!update.shifted());
        assert_eq!(update.generated, 64);
        assert_eq!(grid.stats().occupied, 64);
        assert_eq!(grid.stats().ready, 64);

        // Settled: nothing more to do
        let update = grid.update(Vec3::new(0.5, 0.5, 0.5), &mut pool);
        assert_eq!(update, GridUpdate::default());
    }

    #[test]
    fn test_chunks_sit_at_slot_centers() {
        let mut pool = pool(ground());
        let mut grid = DetailLevelGrid::new(0, level(2.0, 4, 0), Vec3::new(5.0, -3.0, 1.0)).unwrap();
        grid.update(Vec3::new(5.0, -3.0, 1.0), &mut pool);

        for (coord, chunk) in grid.chunks() {
            assert_eq!(chunk.center(), grid.slot_center(coord));
            assert_eq!(chunk.size_in_meters(), 2.0);
        }
    }

    #[test]
    fn test_shift_round_trip_restores_chunks() {
        let mut pool = pool(hills());
        let mut grid = DetailLevelGrid::new(0, level(1.0, 4, 0), Vec3::splat(0.5)).unwrap();
        grid.update(Vec3::splat(0.5), &mut pool);
        let before = visible_centers(&grid);

        let update = grid.update(Vec3::new(-0.5, 0.5, 0.5), &mut pool);
        assert_eq!(update.delta, -I64Vec3::X);
        assert!(!update.teleported);
        // One new face of the layer comes into view
        assert_eq!(update.generated, 16);

        // Chunks filled at the boundary match ones generated directly there
        let mut mixed = 0;
        for (coord, chunk) in grid.chunks().filter(|(coord, _)| grid.is_visible(*coord)) {
            if before.contains(&grid.world_chunk(coord).to_array()) {
                continue;
            }
            let direct = pool.generate(chunk.center(), chunk.size_in_meters());
            assert_eq!(chunk.is_all_solid(), direct.is_all_solid());
            assert_eq!(chunk.is_all_air(), direct.is_all_air());
            let n = CHUNK_SIZE as i32;
            for (x, y, z) in (0..n).flat_map(|z| (0..n).flat_map(move |y| (0..n).map(move |x| (x, y, z)))) {
                assert_eq!(chunk.sample(x, y, z), direct.sample(x, y, z), "block {:?} of {:?}", (x, y, z), coord);
            }
            mixed += (!chunk.is_all_solid() && !chunk.is_all_air()) as usize;
            pool.release(direct);
        }
        assert!(mixed > 0, "boundary face should cut through the hills");

        let update = grid.update(Vec3::splat(0.5), &mut pool);
        assert_eq!(update.delta, I64Vec3::X);
        // The face that scrolled into the margin is still cached
        assert_eq!(update.generated, 0);

        assert_eq!(visible_centers(&grid), before);
        for (coord, chunk) in grid.chunks() {
            assert_eq!(chunk.center(), grid.slot_center(coord));
        }
    }

    #[test]
    fn test_shift_releases_chunks_leaving_storage() {
        let mut pool = pool(ground());
        let mut grid = DetailLevelGrid::new(0, level(1.0, 4, 0), Vec3::ZERO).unwrap();
        grid.update(Vec3::ZERO, &mut pool);

        // Layer 4 plus 2 margin rings each side: the layer's low face sits in
        // slot 2, reaches the storage edge after 2 steps and falls off on the 3rd
        for step in 1..=2 {
            let update = grid.update(Vec3::new(step as f32, 0.0, 0.0), &mut pool);
            assert_eq!(update.released, 0, "step {}", step);
        }
        let update = grid.update(Vec3::new(3.0, 0.0, 0.0), &mut pool);
        assert_eq!(update.released, 16);

        for (coord, chunk) in grid.chunks() {
            assert_eq!(chunk.center(), grid.slot_center(coord));
        }
    }

    #[test]
    fn test_large_jump_empties_every_slot() {
        let mut pool = pool(ground());
        let mut grid = DetailLevelGrid::new(0, level(1.0, 4, 0), Vec3::ZERO).unwrap();
        grid.update(Vec3::ZERO, &mut pool);
        let occupied = grid.stats().occupied;

        let storage = grid.storage_size;
        let (released, teleported) = grid.shift(I64Vec3::new(0, 0, -storage), &mut pool);
        assert!(teleported);
        assert_eq!(released, occupied);
        assert_eq!(grid.stats().occupied, 0);
        assert_eq!(pool.retained(), occupied);
    }

    #[test]
    fn test_teleport_regenerates_at_destination() {
        let mut pool = pool(ground());
        let mut grid = DetailLevelGrid::new(0, level(1.0, 4, 0), Vec3::ZERO).unwrap();
        grid.update(Vec3::ZERO, &mut pool);

        let far = Vec3::new(1000.0, 0.0, -1000.0);
        let update = grid.update(far, &mut pool);
        assert!(update.teleported);
        assert_eq!(update.released, 64);
        assert_eq!(update.generated, 64);
        // Recycled, not reallocated
        assert_eq!(pool.stats().created, 64);

        for (coord, chunk) in grid.chunks() {
            assert_eq!(chunk.center(), grid.slot_center(coord));
            assert!((chunk.center().x - 1000.0).abs() < 3.0);
        }
    }

    #[test]
    fn test_hole_is_never_generated_or_drawn() {
        let mut pool = pool(ground());
        let mut builder = ChunkMeshBuilder::new();

        for observer in [Vec3::ZERO, Vec3::new(-3.2, 0.4, 7.9), Vec3::new(15.0, -2.0, 0.0)] {
            let mut grid = DetailLevelGrid::new(0, level(1.0, 6, 2), observer).unwrap();
            grid.update(observer, &mut pool);
            let hole = grid.hole_bounds().unwrap();
            assert_eq!(hole.size(), Vec3::splat(2.0));

            for (coord, chunk) in grid.chunks() {
                assert!(!hole.contains(chunk.center()), "generated in hole at {:?}", coord);
            }

            // Walk around and keep checking what gets drawn
            for step in 0..4 {
                let position = observer + Vec3::new(step as f32 * 0.7, 0.0, step as f32 * -0.6);
                grid.update(position, &mut pool);
                let hole = grid.hole_bounds().unwrap();

                let mut backend = RecordingBackend::new();
                grid.render(&mut builder, &mut backend);
                for draw in &backend.draws {
                    assert!(!hole.contains(draw.center));
                }
            }
            grid.dispose(&mut pool);
        }
    }

    #[test]
    fn test_extreme_observer_positions_do_not_overflow() {
        let mut pool = pool(ground());
        let mut grid = DetailLevelGrid::new(0, level(1.0, 2, 0), Vec3::ZERO).unwrap();
        grid.update(Vec3::ZERO, &mut pool);

        for observer in [
            Vec3::new(1e19, 0.0, 0.0),
            Vec3::new(-1e19, 0.0, 0.0),
            Vec3::new(f32::MAX, f32::MIN, f32::MAX),
            Vec3::new(f32::MIN, f32::MAX, 0.0),
        ] {
            let update = grid.update(observer, &mut pool);
            assert!(update.teleported, "observer {:?}", observer);
            assert!(grid.center_chunk().abs().max_element() <= CHUNK_COORD_LIMIT);
            for (coord, chunk) in grid.chunks() {
                assert_eq!(chunk.center(), grid.slot_center(coord));
            }
        }

        let clamped = chunk_coord(Vec3::new(1e19, -1e19, 0.5), 1.0);
        assert_eq!(clamped, I64Vec3::new(CHUNK_COORD_LIMIT, -CHUNK_COORD_LIMIT, 0));
    }

    #[test]
    fn test_hole_counts_as_solid_neighbour() {
        let mut pool = pool(Arc::new(UniformDensity(1)));
        let mut builder = ChunkMeshBuilder::new();
        let mut grid = DetailLevelGrid::new(0, level(1.0, 4, 2), Vec3::ZERO).unwrap();
        grid.update(Vec3::ZERO, &mut pool);

        // 4³ layer minus the 2³ hole, every chunk solid and fully enclosed
        let hole_start = grid.hole_start();
        let facing_hole = I64Vec3::new(hole_start - 1, hole_start, hole_start);
        assert!(grid.chunk_at(facing_hole).is_some());
        assert!(grid.is_buried(facing_hole));

        let stats = grid.render(&mut builder, &mut RecordingBackend::new());
        assert_eq!(stats.drawn, 0);
        assert_eq!(stats.skipped_buried, 64 - 8);
    }

    #[test]
    fn test_hole_bounds_follow_center() {
        let mut pool = pool(ground());
        let mut grid = DetailLevelGrid::new(0, level(8.0, 6, 3), Vec3::ZERO).unwrap();

        let hole = grid.hole_bounds().unwrap();
        assert_eq!(hole.min, Vec3::splat(-8.0));
        assert_eq!(hole.max, Vec3::splat(16.0));
        assert!(hole.contains(Vec3::ZERO));

        grid.update(Vec3::new(9.0, 0.0, 0.0), &mut pool);
        let hole = grid.hole_bounds().unwrap();
        assert_eq!(hole.min.x, 0.0);
        assert_eq!(hole.max.x, 24.0);
    }

    #[test]
    fn test_bounding_volume_limits_generation() {
        let mut pool = pool(ground());
        let mut grid = DetailLevelGrid::new(1, level(1.0, 6, 0), Vec3::ZERO).unwrap();
        let bounds = Aabb::new(Vec3::splat(-2.0), Vec3::splat(2.0));
        grid.set_bounding_volume(Some(bounds));
        grid.update(Vec3::ZERO, &mut pool);

        assert_eq!(grid.stats().occupied, 64);
        for (_, chunk) in grid.chunks() {
            assert!(bounds.contains(chunk.center()));
        }

        // Widening the bounds fills the rest of the layer
        grid.set_bounding_volume(None);
        let update = grid.update(Vec3::ZERO, &mut pool);
        assert_eq!(update.generated, 216 - 64);
    }

    #[test]
    fn test_margins_are_not_visible() {
        let grid = DetailLevelGrid::new(0, level(1.0, 4, 0), Vec3::ZERO).unwrap();
        assert_eq!(grid.storage_size(), 8);
        assert_eq!(visible_slot_count(&grid), 64);
        assert!(!grid.is_visible(I64Vec3::new(1, 3, 3)));
        assert!(grid.is_visible(I64Vec3::new(2, 3, 3)));
        assert!(!grid.is_visible(I64Vec3::new(6, 3, 3)));
    }

    #[test]
    fn test_render_skips_air_and_buried_chunks() {
        // Solid everywhere below y = 0, air above
        let mut pool = pool(ground());
        let mut builder = ChunkMeshBuilder::new();
        let mut grid = DetailLevelGrid::new(0, level(1.0, 4, 0), Vec3::new(0.0, 0.5, 0.0)).unwrap();
        grid.update(Vec3::new(0.0, 0.5, 0.0), &mut pool);

        // Layer rows are y = -2..2 chunks: two solid rows, two air rows
        let mut backend = RecordingBackend::new();
        let stats = grid.render(&mut builder, &mut backend);

        assert_eq!(stats.skipped_air, 32);
        // Top solid row is exposed to air; the row below touches only solid
        // neighbours, margin slots and the grid edge
        assert_eq!(stats.drawn, 16);
        assert_eq!(stats.skipped_buried, 16);
        assert_eq!(stats.triangles, 16 * 768);
        assert_eq!(backend.draws.len(), 16);
        assert!(backend.draws.iter().all(|d| d.center.y == -0.5));
    }

    #[test]
    fn test_buried_treats_grid_edge_as_solid() {
        let mut pool = pool(Arc::new(UniformDensity(1)));
        let mut builder = ChunkMeshBuilder::new();
        let mut grid = DetailLevelGrid::new(0, level(1.0, 2, 0), Vec3::ZERO).unwrap();
        grid.update(Vec3::ZERO, &mut pool);

        let stats = grid.render(&mut builder, &mut RecordingBackend::new());
        assert_eq!(stats.drawn, 0);
        assert_eq!(stats.skipped_buried, 8);
    }

    #[test]
    fn test_debug_colors_checkerboard() {
        let mut pool = pool(ground());
        let mut config = level(1.0, 2, 0);
        config.debug_colors = true;
        let mut grid = DetailLevelGrid::new(0, config, Vec3::ZERO).unwrap();
        grid.update(Vec3::ZERO, &mut pool);

        let [even, odd] = level_debug_colors(1.0);
        assert_ne!(even, odd);
        for (coord, chunk) in grid.chunks() {
            let w = grid.world_chunk(coord);
            let expected = if (w.x + w.y + w.z).rem_euclid(2) == 0 { even } else { odd };
            assert_eq!(chunk.debug_color(), expected);
        }
    }

    #[test]
    fn test_dispose_returns_everything() {
        let mut pool = pool(ground());
        let mut grid = DetailLevelGrid::new(0, level(1.0, 4, 0), Vec3::ZERO).unwrap();
        grid.update(Vec3::ZERO, &mut pool);

        grid.dispose(&mut pool);
        assert_eq!(grid.stats().occupied, 0);
        assert_eq!(pool.retained(), 64);
    }

    #[test]
    fn test_background_generation_settles() {
        let scheduler = GenerationScheduler::with_threads(2).unwrap();
        let mut pool = ChunkPool::new(PoolConfig::default(), ground(), scheduler).unwrap();
        let mut grid = DetailLevelGrid::new(0, level(1.0, 4, 0), Vec3::ZERO).unwrap();

        let first = grid.update(Vec3::ZERO, &mut pool);
        assert_eq!(first.generated, 64);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while grid.stats().ready < 64 {
            assert!(std::time::Instant::now() < deadline, "background generation never settled");
            std::thread::sleep(std::time::Duration::from_millis(1));
            grid.update(Vec3::ZERO, &mut pool);
        }
        assert_eq!(grid.stats().pending, 0);
    }
}
