//! Core type aliases and re-exports

pub use glam::{Vec3, Mat4, I64Vec3};

/// Standard Result type for the landscape
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;
