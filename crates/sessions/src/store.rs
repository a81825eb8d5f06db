//! Identity records.
//!
//! [`IdentityStore`] is the data-access seam for identities; the gateway
//! ships a JSON-file implementation that keeps every record in memory,
//! follows changes other processes make to the file, and rewrites it on
//! each mutation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use cg_domain::error::{Error, Result};
use cg_domain::identity::{Identity, IdentityClass, IdentityProfile};
use cg_domain::persona::PersonaOverrides;

use crate::filelock::{FileStamp, StateFileLock};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub trait IdentityStore: Send + Sync {
    /// Look up by access key, optionally constrained to one class.
    fn find_by_secret(&self, secret: &str, class: Option<IdentityClass>) -> Option<Identity>;

    fn get(&self, id: &str) -> Option<Identity>;

    /// Add a new identity.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`] when the id or the secret is already taken.
    fn insert(&self, identity: Identity) -> Result<()>;

    /// Remove an identity, returning the removed record.
    fn delete(&self, id: &str) -> Result<Identity>;

    /// All identities, oldest first.
    fn list(&self) -> Vec<Identity>;

    /// Replace the persona overrides of an identity.
    fn update_overrides(&self, id: &str, overrides: Option<PersonaOverrides>) -> Result<Identity>;

    /// Replace the contact profile of an identity.
    fn update_profile(&self, id: &str, profile: Option<IdentityProfile>) -> Result<Identity>;

    /// Re-read the backing storage. Returns the number of records loaded.
    fn reload(&self) -> Result<usize>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON file store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Identity store backed by a single JSON array file.
///
/// The file is authoritative. Reads re-load it when its stamp changed, so
/// a revocation written by another process is honoured on the next lookup.
/// Writes re-read the file under [`StateFileLock`] and only replace the
/// in-memory map once the new file is in place.
pub struct JsonIdentityStore {
    path: PathBuf,
    state: RwLock<Loaded>,
}

struct Loaded {
    identities: HashMap<String, Identity>,
    stamp: Option<FileStamp>,
}

impl JsonIdentityStore {
    /// Load or create the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(Error::Io)?;
        }
        let stamp = FileStamp::of(path)?;
        let identities = read_file(path)?;

        tracing::info!(
            identities = identities.len(),
            path = %path.display(),
            "identity store loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            state: RwLock::new(Loaded { identities, stamp }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-load the file if it changed since we last saw it. Failures keep
    /// the previous map.
    fn sync(&self) {
        let current = match FileStamp::of(&self.path) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "identity file stat failed");
                return;
            }
        };
        if self.state.read().stamp == current {
            return;
        }
        let mut guard = self.state.write();
        if guard.stamp == current {
            return;
        }
        match read_file(&self.path) {
            Ok(fresh) => {
                tracing::debug!(identities = fresh.len(), "identity file changed, reloaded");
                guard.identities = fresh;
                guard.stamp = current;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "identity file reload failed");
            }
        }
    }

    /// Apply `change` to the on-disk records under the cross-process lock,
    /// persist, then publish the result.
    fn write_through<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut HashMap<String, Identity>) -> Result<T>,
    {
        let _lock = StateFileLock::exclusive(&self.path)?;
        let mut guard = self.state.write();

        let mut next = read_file(&self.path)?;
        let out = change(&mut next)?;
        self.flush(&next)?;

        // An unreadable stamp forces the next read to re-load.
        guard.stamp = FileStamp::of(&self.path).unwrap_or(None);
        guard.identities = next;
        Ok(out)
    }

    /// Write to a temp file, then rename over the store.
    fn flush(&self, identities: &HashMap<String, Identity>) -> Result<()> {
        let mut records: Vec<&Identity> = identities.values().collect();
        records.sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then_with(|| a.id.cmp(&b.id)));
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| Error::Other(format!("serializing identities: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, &self.path).map_err(Error::Io)?;
        Ok(())
    }

    fn mutate<F>(&self, id: &str, f: F) -> Result<Identity>
    where
        F: FnOnce(&mut Identity),
    {
        self.write_through(|all| {
            let entry = all
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("identity {id}")))?;
            f(entry);
            Ok(entry.clone())
        })
    }
}

impl IdentityStore for JsonIdentityStore {
    fn find_by_secret(&self, secret: &str, class: Option<IdentityClass>) -> Option<Identity> {
        if secret.is_empty() {
            return None;
        }
        self.sync();
        self.state
            .read()
            .identities
            .values()
            .find(|i| i.secret == secret && class.map_or(true, |c| i.class == c))
            .cloned()
    }

    fn get(&self, id: &str) -> Option<Identity> {
        self.sync();
        self.state.read().identities.get(id).cloned()
    }

    fn insert(&self, identity: Identity) -> Result<()> {
        if identity.secret.trim().is_empty() {
            return Err(Error::Config("access key must not be empty".into()));
        }
        self.write_through(|all| {
            if all.contains_key(&identity.id) {
                return Err(Error::Conflict(format!("identity {} already exists", identity.id)));
            }
            if all.values().any(|i| i.secret == identity.secret) {
                return Err(Error::Conflict("access key already in use".into()));
            }
            all.insert(identity.id.clone(), identity);
            Ok(())
        })
    }

    fn delete(&self, id: &str) -> Result<Identity> {
        self.write_through(|all| {
            all.remove(id)
                .ok_or_else(|| Error::NotFound(format!("identity {id}")))
        })
    }

    fn list(&self) -> Vec<Identity> {
        self.sync();
        let mut all: Vec<Identity> = self.state.read().identities.values().cloned().collect();
        all.sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    fn update_overrides(&self, id: &str, overrides: Option<PersonaOverrides>) -> Result<Identity> {
        self.mutate(id, |i| i.persona_overrides = overrides)
    }

    fn update_profile(&self, id: &str, profile: Option<IdentityProfile>) -> Result<Identity> {
        self.mutate(id, |i| i.profile = profile)
    }

    fn reload(&self) -> Result<usize> {
        let stamp = FileStamp::of(&self.path)?;
        let fresh = read_file(&self.path)?;
        let n = fresh.len();
        let mut guard = self.state.write();
        guard.identities = fresh;
        guard.stamp = stamp;
        Ok(n)
    }
}

fn read_file(path: &Path) -> Result<HashMap<String, Identity>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
    if raw.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let records: Vec<Identity> = serde_json::from_str(&raw)?;
    Ok(records.into_iter().map(|i| (i.id.clone(), i)).collect())
}
