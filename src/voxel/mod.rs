//! Voxel data structures and operations

pub mod voxel;
pub mod density;
pub mod generation;
pub mod chunk;
pub mod pool;

pub use voxel::{Voxel, AIR_MATERIAL};
pub use density::{
    DensityOracle, FnDensity, GenerationListener, GenerationOutcome,
    SampleRegion, SharedOracle, UniformDensity,
};
pub use generation::{CancelToken, GenerationScheduler, Homogeneity};
pub use chunk::{GenerationState, VoxelChunk, BLOCK_COUNT, CHUNK_SIZE};
pub use pool::{ChunkPool, PoolConfig, PoolStats};
