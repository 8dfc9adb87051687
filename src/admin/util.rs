use std::path::Path;

use crate::primitives::concurrency::{AreaLock, FileLock};
use crate::primitives::io::StdFileIo;

use crate::admin::error::{AdminError, Result};
use crate::admin::options::AdminOpenOptions;

/// Runs `op` against an existing message file while holding the same locks
/// a [`crate::storage::MessageStore`] operation would.
///
/// # Errors
///
/// Returns [`AdminError::MissingStore`] when the file does not exist, or
/// whatever `op` fails with.
pub fn with_message_file<T>(
    path: &Path,
    opts: &AdminOpenOptions,
    op: impl FnOnce(&StdFileIo) -> Result<T>,
) -> Result<T> {
    let lock = AreaLock::for_path(path);
    let _area = lock.acquire();
    if !path.exists() {
        return Err(AdminError::missing_store(path));
    }
    let (io, _) = StdFileIo::open(path)?;
    let _file_lock = if opts.advisory_lock {
        Some(FileLock::exclusive(io.file())?)
    } else {
        None
    };
    op(&io)
}
