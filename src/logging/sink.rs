//! The log file handle: open, append, close.
use std::fs::{self, File, OpenOptions};
use std::io::{Seek as _, SeekFrom, Write as _};
use std::path::{Path, PathBuf};

use crate::error::SinkError;

/// `FILE_SHARE_READ`: other handles may read while we hold the write handle.
#[cfg(windows)]
const FILE_SHARE_READ: u32 = 0x0000_0001;

/// What [`Sink::open`] found at the target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The file did not exist and was created.
    Created,
    /// An existing file was opened for appending.
    Reopened,
}

/// Owner of the on-disk log handle.
///
/// A sink is moved into the writer thread and never touched by producers,
/// so implementations need `Send` but no internal locking.
#[cfg_attr(test, mockall::automock)]
pub trait Sink: Send {
    /// Open `path` for appending, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the directory or file cannot be created or
    /// opened.
    fn open(&mut self, path: &Path) -> Result<OpenOutcome, SinkError>;

    /// Append `bytes` and flush them to disk before returning.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if no file is open or the write fails.
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError>;

    /// Flush and release the handle. Closing a closed sink is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the final flush fails.
    fn close(&mut self) -> Result<(), SinkError>;

    /// Whether a handle is currently held.
    fn is_open(&self) -> bool;
}

/// [`Sink`] backed by a regular file.
///
/// The file is opened read-write, positioned at its end, and held with
/// exclusive write access while other processes may still read it.
#[derive(Debug, Default)]
pub struct FileSink {
    file: Option<File>,
    path: Option<PathBuf>,
}

impl FileSink {
    /// Create a sink with no open file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the currently open file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn open_exclusive(path: &Path) -> std::io::Result<File> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(windows)]
        {
            use std::os::windows::fs::OpenOptionsExt as _;
            options.share_mode(FILE_SHARE_READ);
        }
        options.open(path)
    }

    #[cfg(unix)]
    fn lock(file: &File, path: &Path) -> Result<(), SinkError> {
        fs2::FileExt::try_lock_exclusive(file).map_err(|_| SinkError::Locked {
            path: path.to_path_buf(),
        })
    }

    #[cfg(not(unix))]
    #[allow(clippy::unnecessary_wraps)]
    const fn lock(_file: &File, _path: &Path) -> Result<(), SinkError> {
        Ok(())
    }
}

impl Sink for FileSink {
    fn open(&mut self, path: &Path) -> Result<OpenOutcome, SinkError> {
        self.close()?;
        let open_err = |source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        let existed = path.exists();
        let mut file = Self::open_exclusive(path).map_err(open_err)?;
        Self::lock(&file, path)?;
        file.seek(SeekFrom::End(0)).map_err(open_err)?;
        self.file = Some(file);
        self.path = Some(path.to_path_buf());
        Ok(if existed {
            OpenOutcome::Reopened
        } else {
            OpenOutcome::Created
        })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        let file = self.file.as_mut().ok_or(SinkError::NotOpen)?;
        file.write_all(bytes).map_err(SinkError::Write)?;
        file.flush().map_err(SinkError::Write)?;
        file.sync_data().map_err(SinkError::Write)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.path = None;
        match self.file.take() {
            Some(file) => file.sync_all().map_err(SinkError::Close),
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        self.close().ok();
    }
}
