//! Subscriber setup for binaries and tests embedding the message store.

use crate::types::{Result, StoreError};
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `fmt` subscriber filtered by `level`
/// (an `EnvFilter` directive such as `"info"` or `"msgstore=debug"`).
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when the directive does not parse or a
/// global subscriber is already installed.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level).map_err(|_| StoreError::Invalid("invalid log level"))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| StoreError::Invalid("logging already initialized"))
}
