//! Logging setup.

/// Installs an `env_logger` logger filtered by `RUST_LOG`, defaulting to `info`.
///
/// Calling it more than once is harmless; later calls leave the first logger in place.
///
/// # Example
///
/// ```no_run
/// volcast::init_logging();
/// log::info!("ready");
/// ```
pub fn init_logging() {
    let initialized = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init()
        .is_ok();
    if initialized {
        log::debug!("volcast logging initialized");
    }
}
