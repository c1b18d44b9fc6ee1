//! Multi-resolution chunk streaming around an observer

pub mod config;
pub mod grid;
pub mod landscape;

pub use config::{DetailLevelConfig, LandscapeConfig};
pub use grid::{chunk_center, chunk_coord, CHUNK_COORD_LIMIT, DetailLevelGrid, GridStats, GridUpdate};
pub use landscape::{FrameUpdate, LandscapeStreamer};
