//! Persisted pointer to the active session.
//!
//! The pointer is the access key of the last successful login, kept so a
//! later process can call `restore_session` without prompting again.

use std::io::Write;
use std::path::{Path, PathBuf};

use cg_domain::error::{Error, Result};

pub trait SessionPointer: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, secret: &str) -> Result<()>;
    /// Remove the pointer. Clearing an absent pointer is not an error.
    fn clear(&self) -> Result<()>;
}

// ── File ────────────────────────────────────────────────────────────

/// Pointer stored as a single-line file, owner-readable only on unix.
#[derive(Debug, Clone)]
pub struct FilePointer {
    path: PathBuf,
}

impl FilePointer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.centralgate/active_session`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|h| h.join(".centralgate").join("active_session"))
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionPointer for FilePointer {
    fn load(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let secret = raw.trim();
                Ok((!secret.is_empty()).then(|| secret.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn save(&self, secret: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(Error::Io)?;
        }
        // Fresh temp file created owner-only, then renamed over the
        // pointer, so the secret is never readable by others.
        let tmp = self.path.with_extension("tmp");
        match std::fs::remove_file(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }
        let mut opts = std::fs::OpenOptions::new();
        opts.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut file = opts.open(&tmp).map_err(Error::Io)?;
        file.write_all(secret.as_bytes()).map_err(Error::Io)?;
        file.sync_all().map_err(Error::Io)?;
        std::fs::rename(&tmp, &self.path).map_err(Error::Io)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

// ── OS keychain ─────────────────────────────────────────────────────

/// Pointer stored in the platform credential store via `keyring`.
#[derive(Debug, Clone)]
pub struct KeychainPointer {
    service: String,
    account: String,
}

impl KeychainPointer {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| Error::Auth(format!("keyring entry creation failed: {e}")))
    }
}

impl Default for KeychainPointer {
    fn default() -> Self {
        Self::new("centralgate", "active_session")
    }
}

impl SessionPointer for KeychainPointer {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Auth(format!("keyring get_password failed: {e}"))),
        }
    }

    fn save(&self, secret: &str) -> Result<()> {
        self.entry()?
            .set_password(secret)
            .map_err(|e| Error::Auth(format!("keyring set_password failed: {e}")))
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Auth(format!("keyring delete failed: {e}"))),
        }
    }
}

// ── In-memory ───────────────────────────────────────────────────────

/// Process-local pointer, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryPointer {
    slot: parking_lot::Mutex<Option<String>>,
}

impl SessionPointer for MemoryPointer {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, secret: &str) -> Result<()> {
        *self.slot.lock() = Some(secret.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}
