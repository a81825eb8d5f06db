//! Global runtime settings: default persona and the shared credential pool.
//!
//! [`SettingsStore`] is the single owner of this state. Readers take an
//! `Arc` snapshot; writers go through the administrative methods here,
//! which persist `settings.json` before publishing the new snapshot.
//! Writes start from the file as it is on disk, so a server and a CLI
//! writing the same state never revert each other.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use cg_domain::error::{Error, Result};
use cg_domain::identity::Identity;
use cg_domain::persona::{resolve_persona, GlobalSettings, PersonaOverrides, ResolvedPersona};
use cg_domain::trace::TraceEvent;
use cg_providers::{Credential, CredentialInfo, CredentialPool};
use cg_sessions::{IdentityStore, StateFileLock};

/// Partial update of the persona fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub assistant_name: Option<String>,
    #[serde(default)]
    pub developer_name: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Arc<GlobalSettings>>,
    pool: CredentialPool,
    /// Serializes administrative writes so the file, the snapshot and the
    /// pool always move together.
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Load `path`, or create it from `seed` when it does not exist yet.
    pub fn open(path: &Path, seed: impl FnOnce() -> GlobalSettings) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(Error::Io)?;
        }
        let settings = match read_file(path)? {
            Some(s) => s,
            None => {
                let seeded = seed();
                write_file(path, &seeded)?;
                tracing::info!(
                    path = %path.display(),
                    pool_size = seeded.credentials.len(),
                    "global settings seeded"
                );
                seeded
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            pool: CredentialPool::new(&settings.credentials),
            current: RwLock::new(Arc::new(settings)),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<GlobalSettings> {
        self.current.read().clone()
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Effective persona and credentials for `identity`.
    pub fn resolve_for(&self, identity: &Identity) -> ResolvedPersona {
        let layers: Vec<&PersonaOverrides> = identity.persona_overrides.iter().collect();
        resolve_persona(&layers, &self.snapshot())
    }

    /// Credential snapshot for a resolved persona: the override list when
    /// one is set, the shared pool otherwise.
    pub fn credentials_for(&self, resolved: &ResolvedPersona) -> Arc<[Credential]> {
        if resolved.credentials_overridden {
            Credential::collect(&resolved.credentials)
        } else {
            self.pool.snapshot()
        }
    }

    /// Re-read `settings.json`. A missing file keeps the current state.
    pub fn refresh(&self) -> Result<()> {
        let _w = self.write_lock.lock();
        if let Some(fresh) = read_file(&self.path)? {
            self.publish(fresh);
        }
        Ok(())
    }

    /// Refresh these settings and the identity store together.
    pub fn refresh_with(&self, identities: &dyn IdentityStore) -> Result<()> {
        self.refresh()?;
        let count = identities.reload()?;
        TraceEvent::SettingsRefreshed {
            pool_size: self.pool.len(),
            identities: count,
        }
        .emit();
        Ok(())
    }

    // ── Administrative writes ───────────────────────────────────────

    pub fn update_persona(&self, patch: SettingsPatch) -> Result<Arc<GlobalSettings>> {
        let _w = self.write_lock.lock();
        let _disk = self.lock_and_sync()?;
        let mut next = (*self.snapshot()).clone();
        if let Some(v) = patch.assistant_name {
            next.assistant_name = v;
        }
        if let Some(v) = patch.developer_name {
            next.developer_name = v;
        }
        if let Some(v) = patch.persona {
            next.persona = v;
        }
        if let Some(v) = patch.avatar_url {
            next.avatar_url = v;
        }
        self.commit(next)
    }

    /// Append a credential to the end of the shared pool.
    pub fn add_credential(&self, secret: &str) -> Result<CredentialInfo> {
        let _w = self.write_lock.lock();
        let _disk = self.lock_and_sync()?;
        self.pool.append(secret)?;
        let mut next = (*self.snapshot()).clone();
        next.credentials = self.pool.secrets();
        if let Err(e) = self.commit(next) {
            self.pool.replace(&self.snapshot().credentials);
            return Err(e);
        }
        let fingerprint = Credential::new(secret.trim()).fingerprint();
        self.pool
            .describe()
            .into_iter()
            .find(|c| c.fingerprint == fingerprint)
            .ok_or_else(|| Error::Other("credential vanished after append".into()))
    }

    /// Remove a credential by its value or fingerprint. Returns whether
    /// anything was removed.
    pub fn remove_credential(&self, secret_or_fingerprint: &str) -> Result<bool> {
        let _w = self.write_lock.lock();
        let _disk = self.lock_and_sync()?;
        if !self.pool.remove(secret_or_fingerprint) {
            return Ok(false);
        }
        let mut next = (*self.snapshot()).clone();
        next.credentials = self.pool.secrets();
        if let Err(e) = self.commit(next) {
            self.pool.replace(&self.snapshot().credentials);
            return Err(e);
        }
        Ok(true)
    }

    /// Take the cross-process lock and adopt the on-disk state.
    fn lock_and_sync(&self) -> Result<StateFileLock> {
        let lock = StateFileLock::exclusive(&self.path)?;
        if let Some(disk) = read_file(&self.path)? {
            self.publish(disk);
        }
        Ok(lock)
    }

    fn commit(&self, next: GlobalSettings) -> Result<Arc<GlobalSettings>> {
        write_file(&self.path, &next)?;
        Ok(self.publish(next))
    }

    fn publish(&self, next: GlobalSettings) -> Arc<GlobalSettings> {
        self.pool.replace(&next.credentials);
        let next = Arc::new(next);
        *self.current.write() = next.clone();
        next
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("path", &self.path)
            .field("pool_size", &self.pool.len())
            .finish()
    }
}

fn read_file(path: &Path) -> Result<Option<GlobalSettings>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&raw)?))
}

fn write_file(path: &Path, settings: &GlobalSettings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::Other(format!("serializing settings: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(Error::Io)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
            .map_err(Error::Io)?;
    }
    std::fs::rename(&tmp, path).map_err(Error::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cg_domain::identity::IdentityClass;
    use cg_domain::persona::DEFAULT_ASSISTANT_NAME;

    fn open(dir: &tempfile::TempDir, seed: &[&str]) -> SettingsStore {
        let creds: Vec<String> = seed.iter().map(|s| s.to_string()).collect();
        SettingsStore::open(&dir.path().join("settings.json"), || GlobalSettings {
            credentials: creds,
            ..GlobalSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn seeds_once_then_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        {
            let s = open(&dir, &["k1", "k2"]);
            assert_eq!(s.pool().len(), 2);
        }
        // A different seed is ignored once the file exists.
        let s = open(&dir, &["other"]);
        assert_eq!(s.pool().secrets(), vec!["k1".to_string(), "k2".to_string()]);
        assert_eq!(s.snapshot().assistant_name, DEFAULT_ASSISTANT_NAME);
    }

    #[test]
    fn add_and_remove_credential_persist() {
        let dir = tempfile::tempdir().unwrap();
        let s = open(&dir, &["k1"]);
        let info = s.add_credential("k2").unwrap();
        assert_eq!(info.index, 1);
        assert!(matches!(s.add_credential("k2"), Err(Error::Conflict(_))));

        let reopened = open(&dir, &[]);
        assert_eq!(reopened.pool().len(), 2);

        assert!(s.remove_credential(&info.fingerprint).unwrap());
        assert!(!s.remove_credential("missing").unwrap());
        assert_eq!(s.snapshot().credentials, vec!["k1".to_string()]);
    }

    #[test]
    fn in_flight_snapshot_survives_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let s = open(&dir, &["k1", "k2"]);
        let before = s.pool().snapshot();
        s.remove_credential("k1").unwrap();
        assert_eq!(before.len(), 2);
        assert_eq!(s.pool().snapshot().len(), 1);
    }

    #[test]
    fn patch_changes_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let s = open(&dir, &[]);
        let next = s
            .update_persona(SettingsPatch {
                assistant_name: Some("Nova".into()),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(next.assistant_name, "Nova");
        assert_eq!(next.developer_name, GlobalSettings::default().developer_name);
    }

    #[test]
    fn refresh_picks_up_external_edit() {
        let dir = tempfile::tempdir().unwrap();
        let s = open(&dir, &["k1"]);
        let edited = GlobalSettings {
            credentials: vec!["x".into(), "y".into(), "z".into()],
            ..GlobalSettings::default()
        };
        write_file(s.path(), &edited).unwrap();
        s.refresh().unwrap();
        assert_eq!(s.pool().len(), 3);
    }

    #[test]
    fn override_pool_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let s = open(&dir, &["global"]);
        let mut who = Identity::new("bob", "ck_bob", IdentityClass::Standard, chrono::Utc::now());

        let resolved = s.resolve_for(&who);
        assert_eq!(s.credentials_for(&resolved)[0].expose(), "global");

        who.persona_overrides = Some(PersonaOverrides {
            credentials: vec!["own".into()],
            ..PersonaOverrides::default()
        });
        let resolved = s.resolve_for(&who);
        let creds = s.credentials_for(&resolved);
        assert_eq!(creds.len(), 1);
        assert_eq!(creds[0].expose(), "own");
    }

    #[test]
    fn writers_sharing_the_file_keep_each_others_changes() {
        let dir = tempfile::tempdir().unwrap();
        let server = open(&dir, &["k1"]);
        let cli = open(&dir, &[]);

        cli.add_credential("k2").unwrap();
        server
            .update_persona(SettingsPatch {
                assistant_name: Some("Nova".into()),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(server.pool().len(), 2);

        let reopened = open(&dir, &[]);
        assert_eq!(
            reopened.pool().secrets(),
            vec!["k1".to_string(), "k2".to_string()]
        );
        assert_eq!(reopened.snapshot().assistant_name, "Nova");
    }
}
