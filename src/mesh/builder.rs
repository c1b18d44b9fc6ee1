//! Face-culling mesh builder
//!
//! Walks every solid block and emits a quad for each face whose neighbour is
//! air or lies outside the chunk. There is no cross-chunk culling, so a solid
//! chunk always produces a closed cube.

use glam::Vec3;

use crate::core::{ConfigError, Result};
use crate::voxel::chunk::{VoxelChunk, BLOCK_COUNT, CHUNK_SIZE};

use super::buffer::ChunkMesh;
use super::vertex::MeshVertex;

/// Upper bound on quads in one chunk (every face of every block)
pub const MAX_QUADS: usize = 6 * BLOCK_COUNT;

/// Worst-case vertex count: four unshared corners per quad
pub const MAX_VERTICES: usize = 4 * MAX_QUADS;

/// Worst-case index count: two triangles per quad
pub const MAX_INDICES: usize = 6 * MAX_QUADS;

/// Default fraction of a buffer's capacity below which it is reallocated
pub const SHRINK_THRESHOLD: f32 = 0.1;

/// Two triangles per quad, counter-clockwise seen from outside
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

struct Face {
    /// Offset to the neighbour block and face normal
    normal: [i32; 3],
    /// Unit-cube corners in winding order
    corners: [[f32; 3]; 4],
}

const FACES: [Face; 6] = [
    // -X
    Face {
        normal: [-1, 0, 0],
        corners: [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
    },
    // +X
    Face {
        normal: [1, 0, 0],
        corners: [[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [1.0, 0.0, 1.0]],
    },
    // -Y
    Face {
        normal: [0, -1, 0],
        corners: [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
    },
    // +Y
    Face {
        normal: [0, 1, 0],
        corners: [[0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0]],
    },
    // -Z
    Face {
        normal: [0, 0, -1],
        corners: [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
    },
    // +Z
    Face {
        normal: [0, 0, 1],
        corners: [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
    },
];

#[inline]
fn in_chunk(v: i32) -> bool {
    (0..CHUNK_SIZE as i32).contains(&v)
}

/// Builds chunk meshes into shared scratch buffers.
///
/// One builder is meant to serve every chunk of a landscape; the scratch
/// buffers are sized for the worst case once and never grow.
pub struct ChunkMeshBuilder {
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    shrink_threshold: f32,
    reallocations: u64,
}

impl ChunkMeshBuilder {
    pub fn new() -> Self {
        Self::build_with(SHRINK_THRESHOLD)
    }

    /// Builder with a custom reuse threshold in 0.0-1.0
    pub fn with_shrink_threshold(shrink_threshold: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&shrink_threshold) {
            return Err(ConfigError::ShrinkThreshold(shrink_threshold).into());
        }
        Ok(Self::build_with(shrink_threshold))
    }

    fn build_with(shrink_threshold: f32) -> Self {
        Self {
            vertices: Vec::with_capacity(MAX_VERTICES),
            indices: Vec::with_capacity(MAX_INDICES),
            shrink_threshold,
            reallocations: 0,
        }
    }

    /// Mesh the chunk's current voxel data.
    ///
    /// `previous` is written in place when it has room and would not be left
    /// mostly empty; otherwise a mesh sized to the result is allocated.
    pub fn build(&mut self, chunk: &VoxelChunk, previous: Option<ChunkMesh>) -> ChunkMesh {
        self.vertices.clear();
        self.indices.clear();

        let n = CHUNK_SIZE as i32;
        let block_size = chunk.block_size_in_meters();
        let origin = Vec3::splat(-0.5 * chunk.size_in_meters());
        let color = chunk.debug_color();

        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    if !chunk.is_solid(x, y, z) {
                        continue;
                    }

                    for face in &FACES {
                        let [dx, dy, dz] = face.normal;
                        let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                        let exposed = !(in_chunk(nx) && in_chunk(ny) && in_chunk(nz))
                            || !chunk.is_solid(nx, ny, nz);
                        if exposed {
                            self.emit_quad(face, origin, Vec3::new(x as f32, y as f32, z as f32), block_size, color);
                        }
                    }
                }
            }
        }

        let (vertex_count, index_count) = (self.vertices.len(), self.indices.len());
        match previous {
            Some(mut mesh) if mesh.can_reuse(vertex_count, index_count, self.shrink_threshold) => {
                mesh.upload(&self.vertices, &self.indices);
                mesh
            }
            previous => {
                if let Some(old) = previous {
                    self.reallocations += 1;
                    log::trace!(
                        "Reallocating chunk mesh: {} -> {} vertices",
                        old.vertex_capacity(),
                        vertex_count
                    );
                }
                let mut mesh = ChunkMesh::with_capacity(vertex_count, index_count);
                mesh.upload(&self.vertices, &self.indices);
                mesh
            }
        }
    }

    fn emit_quad(&mut self, face: &Face, origin: Vec3, block: Vec3, block_size: f32, color: [f32; 4]) {
        let base = self.vertices.len() as u32;
        let normal = Vec3::new(face.normal[0] as f32, face.normal[1] as f32, face.normal[2] as f32);

        for corner in &face.corners {
            let position = origin + (block + Vec3::from_array(*corner)) * block_size;
            self.vertices.push(MeshVertex::new(position, normal, color));
        }
        self.indices.extend(QUAD_INDICES.iter().map(|i| base + i));
    }

    pub fn shrink_threshold(&self) -> f32 {
        self.shrink_threshold
    }

    /// Meshes that could not reuse their previous allocation
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }
}

impl Default for ChunkMeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::density::{FnDensity, SharedOracle, UniformDensity};
    use crate::voxel::generation::GenerationScheduler;
    use crate::voxel::voxel::{Voxel, AIR_MATERIAL};
    use std::sync::Arc;

    fn chunk_with(oracle: SharedOracle) -> VoxelChunk {
        let mut chunk = VoxelChunk::new();
        chunk.initialize(Vec3::splat(4.0), 8.0, &oracle, &GenerationScheduler::Inline);
        chunk
    }

    fn checkerboard() -> SharedOracle {
        Arc::new(FnDensity(|p: Vec3, _: f32| {
            let q = p.floor();
            ((q.x as i64 + q.y as i64 + q.z as i64).rem_euclid(2) == 0) as u8
        }))
    }

    #[test]
    fn test_solid_chunk_is_closed_cube() {
        let chunk = chunk_with(Arc::new(UniformDensity(1)));
        let mesh = ChunkMeshBuilder::new().build(&chunk, None);

        let n = CHUNK_SIZE;
        assert_eq!(mesh.triangle_count(), 12 * n * n);
        assert_eq!(mesh.triangle_count(), 768);
        assert_eq!(mesh.vertex_count(), 4 * 6 * n * n);
    }

    #[test]
    fn test_air_chunk_has_no_triangles() {
        let chunk = chunk_with(Arc::new(UniformDensity(AIR_MATERIAL)));
        let mesh = ChunkMeshBuilder::new().build(&chunk, None);
        assert_eq!(mesh.triangle_count(), 0);
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_single_block_has_six_faces() {
        let oracle: SharedOracle = Arc::new(FnDensity(|p: Vec3, _: f32| {
            (p.x < 1.0 && p.y < 1.0 && p.z < 1.0) as u8
        }));
        let chunk = chunk_with(oracle);
        let mesh = ChunkMeshBuilder::new().build(&chunk, None);

        assert_eq!(mesh.triangle_count(), 12);
        // Block (0,0,0) spans [-4, -3) in chunk-local space
        for vertex in mesh.vertices() {
            let p = vertex.position();
            assert!(p.cmpge(Vec3::splat(-4.0)).all() && p.cmple(Vec3::splat(-3.0)).all());
        }
    }

    #[test]
    fn test_checkerboard_is_worst_case() {
        let chunk = chunk_with(checkerboard());
        let mesh = ChunkMeshBuilder::new().build(&chunk, None);

        // Half the blocks solid, every face exposed
        assert_eq!(mesh.triangle_count(), BLOCK_COUNT / 2 * 12);
        assert!(mesh.vertex_count() <= MAX_VERTICES);
        assert!(mesh.index_count() <= MAX_INDICES);
    }

    #[test]
    fn test_winding_matches_normals() {
        let chunk = chunk_with(checkerboard());
        let mesh = ChunkMeshBuilder::new().build(&chunk, None);
        let vertices = mesh.vertices();

        for triangle in mesh.indices().chunks(3) {
            let a = vertices[triangle[0] as usize];
            let b = vertices[triangle[1] as usize].position();
            let c = vertices[triangle[2] as usize].position();
            let winding = (b - a.position()).cross(c - a.position());
            assert!(winding.dot(a.normal()) > 0.0);
        }
    }

    #[test]
    fn test_indices_in_range() {
        let chunk = chunk_with(checkerboard());
        let mesh = ChunkMeshBuilder::new().build(&chunk, None);
        let count = mesh.vertex_count() as u32;
        assert!(mesh.indices().iter().all(|&i| i < count));
    }

    #[test]
    fn test_reuses_previous_buffer() {
        let mut builder = ChunkMeshBuilder::new();
        let mut chunk = chunk_with(Arc::new(UniformDensity(1)));

        let first = builder.build(&chunk, None);
        let capacity = first.vertex_capacity();

        // Carving one corner block still fits
        chunk.set_voxel(0, 0, 0, Voxel::AIR);
        let second = builder.build(&chunk, Some(first));
        assert_eq!(second.vertex_capacity(), capacity);
        assert_eq!(second.upload_count(), 2);
        assert_eq!(builder.reallocations(), 0);
    }

    #[test]
    fn test_reallocates_when_too_small_or_too_sparse() {
        let mut builder = ChunkMeshBuilder::new();
        let solid = chunk_with(Arc::new(UniformDensity(1)));
        let sparse = chunk_with(checkerboard());

        // Growth: the checkerboard needs far more than a cube
        let cube = builder.build(&solid, None);
        let grown = builder.build(&sparse, Some(cube));
        assert_eq!(grown.vertex_capacity(), grown.vertex_count());
        assert_eq!(grown.upload_count(), 1);

        // Shrink: a single block would use under 10% of the checkerboard allocation
        let single = chunk_with(Arc::new(FnDensity(|p: Vec3, _: f32| {
            (p.x < 1.0 && p.y < 1.0 && p.z < 1.0) as u8
        })));
        let shrunk = builder.build(&single, Some(grown));
        assert_eq!(shrunk.vertex_capacity(), 24);
        assert_eq!(builder.reallocations(), 2);
    }

    #[test]
    fn test_shrink_threshold_out_of_range_is_rejected() {
        assert!(ChunkMeshBuilder::with_shrink_threshold(-0.1).is_err());
        assert!(ChunkMeshBuilder::with_shrink_threshold(1.5).is_err());
        assert!(ChunkMeshBuilder::with_shrink_threshold(f32::NAN).is_err());

        let builder = ChunkMeshBuilder::with_shrink_threshold(0.5).unwrap();
        assert_eq!(builder.shrink_threshold(), 0.5);
    }

    #[test]
    fn test_vertex_color_follows_chunk() {
        let mut chunk = chunk_with(Arc::new(UniformDensity(1)));
        let mut builder = ChunkMeshBuilder::new();

        let mesh = builder.build(&chunk, None);
        assert!(mesh.vertices().iter().all(|v| v.color == [1.0; 4]));

        chunk.set_debug_color([0.2, 0.5, 0.1, 1.0]);
        let mesh = builder.build(&chunk, Some(mesh));
        assert!(mesh.vertices().iter().all(|v| v.color == [0.2, 0.5, 0.1, 1.0]));
    }
}
