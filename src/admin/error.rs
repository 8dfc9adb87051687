use std::path::{Path, PathBuf};

use crate::types::StoreError;
use thiserror::Error;

/// Error type for administrative operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Message file not found at the specified path.
    #[error("message file not found: {0}")]
    MissingStore(PathBuf),
    /// Core store error.
    #[error(transparent)]
    Core(#[from] StoreError),
    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for administrative operations.
pub type Result<T> = std::result::Result<T, AdminError>;

impl AdminError {
    pub(crate) fn missing_store(path: impl AsRef<Path>) -> Self {
        AdminError::MissingStore(path.as_ref().to_path_buf())
    }
}
