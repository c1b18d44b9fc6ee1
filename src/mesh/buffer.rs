//! Capacity-tracked mesh storage
//!
//! A [`ChunkMesh`] stands in for the vertex and index buffers a backend
//! keeps on the GPU. Capacities are fixed when the mesh is allocated; later
//! uploads that fit are written in place.

use super::vertex::MeshVertex;

/// Triangle-list mesh owned by one chunk
#[derive(Clone, Debug, Default)]
pub struct ChunkMesh {
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    vertex_capacity: usize,
    index_capacity: usize,
    uploads: u32,
}

impl ChunkMesh {
    /// Allocate storage for exactly this many vertices and indices
    pub fn with_capacity(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_capacity),
            indices: Vec::with_capacity(index_capacity),
            vertex_capacity,
            index_capacity,
            uploads: 0,
        }
    }

    /// Whether new contents of the given size can be written in place.
    ///
    /// Requires enough capacity, and that the vertex count is at least
    /// `shrink_threshold` of the capacity so one complex chunk does not pin
    /// a large allocation forever.
    pub fn can_reuse(&self, vertex_count: usize, index_count: usize, shrink_threshold: f32) -> bool {
        vertex_count <= self.vertex_capacity
            && index_count <= self.index_capacity
            && vertex_count as f32 >= shrink_threshold * self.vertex_capacity as f32
    }

    /// Replace the contents. Callers check [`Self::can_reuse`] first.
    pub fn upload(&mut self, vertices: &[MeshVertex], indices: &[u32]) {
        debug_assert!(vertices.len() <= self.vertex_capacity);
        debug_assert!(indices.len() <= self.index_capacity);

        self.vertices.clear();
        self.vertices.extend_from_slice(vertices);
        self.indices.clear();
        self.indices.extend_from_slice(indices);
        self.uploads += 1;
    }

    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertex_capacity
    }

    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    /// Number of times contents were written into this allocation
    pub fn upload_count(&self) -> u32 {
        self.uploads
    }

    /// Raw vertex bytes, ready for a GPU upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw index bytes, ready for a GPU upload
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
