//! Logging initialization and utilities

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// voxscape::core::logging::init();
/// log::info!("Landscape started");
/// ```
pub fn init() {
    // A second call (tests, embedding hosts) keeps the first logger.
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
