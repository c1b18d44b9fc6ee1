//! Voxscape - a streaming multi-resolution voxel landscape

pub mod core;
pub mod math;
pub mod voxel;
pub mod mesh;
pub mod render;
pub mod streaming;
pub mod terrain;
