#![allow(unsafe_code)]

//! Serialization of whole store operations against one message area file.
//!
//! Every operation runs under two locks: a process-wide mutex keyed by the
//! area path, and (optionally) an exclusive advisory lock on the area file
//! itself for other processes. POSIX record locks are dropped when *any*
//! descriptor of the file closes in this process, so the process mutex must
//! be held for as long as the file handle is open.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RawMutex};
use tracing::trace;

use crate::types::{Result, StoreError};

/// Guard for the process-wide area mutex.
pub type AreaGuard = parking_lot::ArcMutexGuard<RawMutex, ()>;

static AREA_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// Process-wide lock for one message area path.
#[derive(Clone)]
pub struct AreaLock {
    key: PathBuf,
    inner: Arc<Mutex<()>>,
}

impl AreaLock {
    /// Returns the lock shared by every handle on `path` in this process.
    pub fn for_path(path: &Path) -> Self {
        let key = lock_key(path);
        let registry = AREA_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
        let inner = registry
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self { key, inner }
    }

    /// Blocks until this process holds the area.
    pub fn acquire(&self) -> AreaGuard {
        trace!(area = %self.key.display(), "lock.area.acquire");
        self.inner.lock_arc()
    }

    /// Acquires the area only if it is free.
    pub fn try_acquire(&self) -> Option<AreaGuard> {
        self.inner.try_lock_arc()
    }

    /// Normalized path the lock is keyed on.
    pub fn key(&self) -> &Path {
        &self.key
    }
}

fn lock_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    // The file may not exist yet; resolve through its directory instead.
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            match std::fs::canonicalize(parent) {
                Ok(dir) => dir.join(name),
                Err(_) => path.to_path_buf(),
            }
        }
        _ => path.to_path_buf(),
    }
}

/// Exclusive advisory lock over a whole file, released on drop.
pub struct FileLock<'a> {
    file: &'a File,
}

impl<'a> FileLock<'a> {
    /// Blocks until an exclusive lock on the entire file is held.
    pub fn exclusive(file: &'a File) -> Result<Self> {
        lock_whole_file(file).map_err(StoreError::from)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        if let Err(_err) = unlock_whole_file(self.file) {
            #[cfg(debug_assertions)]
            eprintln!("failed to unlock message file: {_err:?}");
        }
    }
}

#[cfg(unix)]
fn lock_whole_file(file: &File) -> io::Result<()> {
    unix::set_lock(file, libc::F_WRLCK as libc::c_short, true)
}

#[cfg(unix)]
fn unlock_whole_file(file: &File) -> io::Result<()> {
    unix::set_lock(file, libc::F_UNLCK as libc::c_short, false)
}

#[cfg(not(unix))]
fn lock_whole_file(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock_whole_file(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::io::AsRawFd;

    pub fn set_lock(file: &File, l_type: libc::c_short, blocking: bool) -> io::Result<()> {
        let fd = file.as_raw_fd();
        // SAFETY: flock is plain old data; zeroed is a valid starting value.
        let mut flock: libc::flock = unsafe { std::mem::zeroed() };
        flock.l_type = l_type;
        flock.l_whence = libc::SEEK_SET as libc::c_short;
        flock.l_start = 0;
        // Zero length covers the file including any future growth.
        flock.l_len = 0;
        let cmd = if blocking {
            libc::F_SETLKW
        } else {
            libc::F_SETLK
        };
        loop {
            // SAFETY: fd is a live descriptor owned by `file`, flock is initialized.
            let res = unsafe { libc::fcntl(fd, cmd, &mut flock) };
            if res == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) if blocking => continue,
                _ => return Err(err),
            }
        }
    }
}
