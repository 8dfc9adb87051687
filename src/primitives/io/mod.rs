#![forbid(unsafe_code)]

use std::{fs::File, io, path::Path};

use tracing::trace;

use crate::types::{Result, StoreError};

/// Trait for positioned file I/O against a message area file.
pub trait FileIo: Send + Sync {
    /// Reads into `dst` starting at `off`, stopping early at end of file.
    ///
    /// Returns the number of bytes read; `0` means `off` is at or past the end.
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<usize>;
    /// Writes all of `src` at `off`, extending the file when needed.
    fn write_at(&self, off: u64, src: &[u8]) -> Result<()>;
    /// Synchronizes all file data and metadata to disk.
    fn sync_all(&self) -> Result<()>;
    /// Returns the current length of the file in bytes.
    fn len(&self) -> Result<u64>;
    /// Returns true if the file is empty.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
    /// Truncates or extends the file to the specified length.
    fn set_len(&self, len: u64) -> Result<()>;
}

#[cfg(unix)]
/// Unix positioned I/O using `pread`/`pwrite`.
pub mod stdio_unix {
    use std::{
        fs::File,
        io::{self, ErrorKind},
        os::unix::fs::FileExt,
    };

    /// Reads until `dst` is full or end of file, returning the bytes read.
    pub fn read_full(file: &File, mut off: u64, dst: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < dst.len() {
            match file.read_at(&mut dst[filled..], off) {
                Ok(0) => break,
                Ok(read) => {
                    filled += read;
                    off += read as u64;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }

    /// Writes all bytes at offset using `pwrite` semantics.
    pub fn write_all(file: &File, mut off: u64, mut src: &[u8]) -> io::Result<()> {
        while !src.is_empty() {
            let written = file.write_at(src, off)?;
            if written == 0 {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "write_at wrote zero bytes",
                ));
            }
            src = &src[written..];
            off += written as u64;
        }
        Ok(())
    }
}

#[cfg(windows)]
/// Windows positioned I/O using `seek_read`/`seek_write`.
pub mod stdio_win {
    use std::{
        fs::File,
        io::{self, ErrorKind},
        os::windows::fs::FileExt,
    };

    /// Reads until `dst` is full or end of file, returning the bytes read.
    pub fn read_full(file: &File, mut off: u64, dst: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < dst.len() {
            match file.seek_read(&mut dst[filled..], off) {
                Ok(0) => break,
                Ok(read) => {
                    filled += read;
                    off += read as u64;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }

    /// Writes all bytes at offset using `seek_write` semantics.
    pub fn write_all(file: &File, mut off: u64, mut src: &[u8]) -> io::Result<()> {
        while !src.is_empty() {
            let written = file.seek_write(src, off)?;
            if written == 0 {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "seek_write wrote zero bytes",
                ));
            }
            src = &src[written..];
            off += written as u64;
        }
        Ok(())
    }
}

/// Owned read-write handle on a message area file. Closed on drop.
pub struct StdFileIo {
    inner: File,
}

impl StdFileIo {
    /// Wraps an existing file handle.
    pub fn new(file: File) -> Self {
        Self { inner: file }
    }

    /// Opens a file for read-write access, creating it when missing.
    ///
    /// Returns the handle and whether the file was newly created.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, bool)> {
        let path = path.as_ref();
        let mut opts = std::fs::OpenOptions::new();
        opts.read(true).write(true);
        match opts.open(path) {
            Ok(file) => Ok((Self::new(file), false)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let file = opts
                    .create(true)
                    .truncate(false)
                    .open(path)
                    .map_err(StoreError::from)?;
                trace!(path = %path.display(), "io.open.created");
                Ok((Self::new(file), true))
            }
            Err(err) => Err(StoreError::from(err)),
        }
    }

    /// Returns the underlying file.
    pub fn file(&self) -> &File {
        &self.inner
    }

    #[cfg(unix)]
    fn read_full(&self, off: u64, dst: &mut [u8]) -> io::Result<usize> {
        stdio_unix::read_full(self.file(), off, dst)
    }

    #[cfg(windows)]
    fn read_full(&self, off: u64, dst: &mut [u8]) -> io::Result<usize> {
        stdio_win::read_full(self.file(), off, dst)
    }

    #[cfg(unix)]
    fn write_all(&self, off: u64, src: &[u8]) -> io::Result<()> {
        stdio_unix::write_all(self.file(), off, src)
    }

    #[cfg(windows)]
    fn write_all(&self, off: u64, src: &[u8]) -> io::Result<()> {
        stdio_win::write_all(self.file(), off, src)
    }

    #[cfg(not(any(unix, windows)))]
    fn read_full(&self, _off: u64, _dst: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "StdFileIo unsupported on this platform",
        ))
    }

    #[cfg(not(any(unix, windows)))]
    fn write_all(&self, _off: u64, _src: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "StdFileIo unsupported on this platform",
        ))
    }
}

impl FileIo for StdFileIo {
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<usize> {
        let read = self.read_full(off, dst).map_err(StoreError::from)?;
        trace!(off, wanted = dst.len(), read, "io.read_at");
        Ok(read)
    }

    fn write_at(&self, off: u64, src: &[u8]) -> Result<()> {
        trace!(off, len = src.len(), "io.write_at");
        self.write_all(off, src).map_err(StoreError::from)
    }

    fn sync_all(&self) -> Result<()> {
        self.file().sync_all().map_err(StoreError::from)
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file().metadata().map_err(StoreError::from)?.len())
    }

    fn set_len(&self, len: u64) -> Result<()> {
        self.file().set_len(len).map_err(StoreError::from)
    }
}
