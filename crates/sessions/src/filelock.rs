//! Cross-process write lock for the JSON state files.
//!
//! `serve` and the CLI may write the same files. Writers take an exclusive
//! `fs2` lock on a `<name>.lock` sidecar, re-read the file, apply their
//! change and rename the result into place before releasing it.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fs2::FileExt;

use cg_domain::error::{Error, Result};

/// Held exclusive lock. Released on drop.
#[derive(Debug)]
pub struct StateFileLock {
    file: File,
    path: PathBuf,
}

impl StateFileLock {
    /// Block until the write lock for `target` is ours.
    pub fn exclusive(target: &Path) -> Result<Self> {
        let path = lock_path(target);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(Error::Io)?;
        file.lock_exclusive().map_err(Error::Io)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateFileLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::debug!(path = %self.path.display(), error = %e, "state lock release failed");
        }
    }
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

/// Modification stamp of a state file, `None` when it does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    pub fn of(path: &Path) -> Result<Option<Self>> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(Some(Self {
                modified: meta.modified().map_err(Error::Io)?,
                len: meta.len(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
