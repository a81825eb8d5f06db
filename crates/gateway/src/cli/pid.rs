//! Server PID file.
//!
//! `serve` holds an exclusive `fs2` lock on `[server].pid_file` for as long
//! as it runs. The lock is taken before the file is touched, so a refused
//! second start leaves the live server's PID in place. CLI commands use
//! [`running_server`] to find out whether a live server shares their state.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs2::FileExt;

/// Locked PID file of the running server. Removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    file: File,
}

impl PidFile {
    /// Lock `path` and record the current PID in it.
    pub fn acquire(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("opening PID file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            match read_pid(path) {
                Some(pid) => anyhow::bail!(
                    "centralgate is already serving this state (pid {pid}, {})",
                    path.display()
                ),
                None => anyhow::bail!(
                    "centralgate is already serving this state ({} is locked)",
                    path.display()
                ),
            }
        }

        let pid = std::process::id();
        file.set_len(0)?;
        writeln!(file, "{pid}")?;
        file.sync_all()?;

        tracing::info!(path = %path.display(), pid, "PID file locked");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "PID file removed"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove PID file")
            }
        }
        if let Err(e) = self.file.unlock() {
            tracing::debug!(error = %e, "PID file unlock failed");
        }
    }
}

/// PID of the server holding the lock on `path`, if one is running.
pub fn running_server(path: &Path) -> Option<u32> {
    let file = File::open(path).ok()?;
    if file.try_lock_shared().is_ok() {
        // Nobody holds it: a leftover file from a crashed server.
        return None;
    }
    read_pid(path)
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_server_is_refused_and_first_pid_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("centralgate.pid");

        let _held = PidFile::acquire(&path).unwrap();
        let err = PidFile::acquire(&path).unwrap_err().to_string();
        assert!(err.contains("already serving"), "{err}");
        assert!(err.contains(&std::process::id().to_string()), "{err}");

        assert_eq!(read_pid(&path), Some(std::process::id()));
    }

    #[test]
    fn running_server_follows_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("run").join("cg.pid");
        assert_eq!(running_server(&path), None);

        let held = PidFile::acquire(&path).unwrap();
        assert_eq!(held.path(), path.as_path());
        assert_eq!(running_server(&path), Some(std::process::id()));

        drop(held);
        assert!(!path.exists());
        assert_eq!(running_server(&path), None);
    }

    #[test]
    fn stale_file_is_not_a_running_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cg.pid");
        fs::write(&path, "4242\n").unwrap();
        assert_eq!(running_server(&path), None);

        let held = PidFile::acquire(&path).unwrap();
        assert_eq!(read_pid(held.path()), Some(std::process::id()));
    }
}
