//! Core types, errors and logging

pub mod types;
pub mod error;
pub mod logging;

pub use types::*;
pub use error::{ConfigError, Error};
