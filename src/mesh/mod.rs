//! Surface meshes for voxel chunks
//!
//! Meshes are built by per-voxel face culling: every solid block emits a quad
//! for each face that borders air or the chunk boundary.

pub mod vertex;
pub mod buffer;
pub mod builder;

pub use vertex::MeshVertex;
pub use buffer::ChunkMesh;
pub use builder::{ChunkMeshBuilder, MAX_INDICES, MAX_QUADS, MAX_VERTICES, SHRINK_THRESHOLD};
