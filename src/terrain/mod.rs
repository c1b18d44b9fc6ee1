//! Procedural terrain density

pub mod generator;
pub use generator::{NoiseTerrain, TerrainParams};
