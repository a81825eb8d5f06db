//! Ordered credential pool with snapshot reads.
//!
//! [`CredentialPool`] holds the list of upstream API keys behind an
//! `RwLock<Arc<[Credential]>>`. Readers take a cheap `Arc` snapshot and
//! iterate it without holding the lock, so a mutation made while a
//! dispatch is running only affects dispatches that start afterwards.

use cg_domain::error::{Error, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::util::{fingerprint, mask_secret};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credential
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One upstream API key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    secret: String,
}

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// The raw key, for building the upstream request only.
    pub fn expose(&self) -> &str {
        &self.secret
    }

    /// Stable short hash used to identify the key in logs.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.secret)
    }

    pub fn masked(&self) -> String {
        mask_secret(&self.secret)
    }

    /// Build an immutable snapshot from raw key strings, dropping blanks.
    pub fn collect(secrets: &[String]) -> Arc<[Credential]> {
        secrets
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(Credential::new)
            .collect()
    }
}

// Manual Debug impl to avoid leaking key values.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Display-safe description of a pool entry.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialInfo {
    pub index: usize,
    pub masked: String,
    pub fingerprint: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CredentialPool {
    entries: RwLock<Arc<[Credential]>>,
}

impl CredentialPool {
    pub fn new(secrets: &[String]) -> Self {
        Self {
            entries: RwLock::new(Credential::collect(secrets)),
        }
    }

    /// Current contents. The returned slice never changes.
    pub fn snapshot(&self) -> Arc<[Credential]> {
        self.entries.read().clone()
    }

    /// Swap in a whole new list.
    pub fn replace(&self, secrets: &[String]) {
        *self.entries.write() = Credential::collect(secrets);
    }

    /// Append a key at the end of the pool.
    ///
    /// # Errors
    ///
    /// Blank keys and keys already present are rejected.
    pub fn append(&self, secret: &str) -> Result<()> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(Error::Config("credential must not be empty".into()));
        }
        let mut guard = self.entries.write();
        if guard.iter().any(|c| c.expose() == secret) {
            return Err(Error::Conflict(format!(
                "credential {} is already in the pool",
                mask_secret(secret)
            )));
        }
        let mut next: Vec<Credential> = guard.to_vec();
        next.push(Credential::new(secret));
        *guard = next.into();
        Ok(())
    }

    /// Remove a key by exact value or by fingerprint. Returns whether
    /// anything was removed.
    pub fn remove(&self, secret_or_fingerprint: &str) -> bool {
        let needle = secret_or_fingerprint.trim();
        let mut guard = self.entries.write();
        let before = guard.len();
        let next: Vec<Credential> = guard
            .iter()
            .filter(|c| c.expose() != needle && c.fingerprint() != needle)
            .cloned()
            .collect();
        let removed = next.len() != before;
        if removed {
            *guard = next.into();
        }
        removed
    }

    /// Raw key strings in pool order, for persisting.
    pub fn secrets(&self) -> Vec<String> {
        self.snapshot().iter().map(|c| c.expose().to_string()).collect()
    }

    pub fn describe(&self) -> Vec<CredentialInfo> {
        self.snapshot()
            .iter()
            .enumerate()
            .map(|(index, c)| CredentialInfo {
                index,
                masked: c.masked(),
                fingerprint: c.fingerprint(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn snapshot_preserves_order_and_drops_blanks() {
        let pool = CredentialPool::new(&keys(&["a", " ", "b"]));
        let snap = pool.snapshot();
        let raw: Vec<&str> = snap.iter().map(|c| c.expose()).collect();
        assert_eq!(raw, vec!["a", "b"]);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_mutation() {
        let pool = CredentialPool::new(&keys(&["a", "b"]));
        let before = pool.snapshot();
        pool.append("c").unwrap();
        assert!(pool.remove("a"));
        assert_eq!(before.len(), 2);
        assert_eq!(before[0].expose(), "a");
        assert_eq!(pool.secrets(), vec!["b", "c"]);
    }

    #[test]
    fn append_rejects_duplicates_and_blanks() {
        let pool = CredentialPool::new(&keys(&["a"]));
        assert!(matches!(pool.append("a"), Err(Error::Conflict(_))));
        assert!(matches!(pool.append("  "), Err(Error::Config(_))));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn remove_by_fingerprint() {
        let pool = CredentialPool::new(&keys(&["alpha-key-000001", "beta-key-0000002"]));
        let fp = pool.describe()[1].fingerprint.clone();
        assert!(pool.remove(&fp));
        assert_eq!(pool.secrets(), vec!["alpha-key-000001"]);
        assert!(!pool.remove("missing"));
    }

    #[test]
    fn replace_swaps_whole_list() {
        let pool = CredentialPool::new(&keys(&["a"]));
        pool.replace(&keys(&["x", "y"]));
        assert_eq!(pool.secrets(), vec!["x", "y"]);
    }

    #[test]
    fn debug_does_not_leak_keys() {
        let c = Credential::new("AIzaSuperSecretValue");
        let s = format!("{c:?}");
        assert!(!s.contains("AIzaSuperSecretValue"));
        let info = CredentialPool::new(&keys(&["AIzaSuperSecretValue"])).describe();
        assert_eq!(info[0].masked, "AIza…alue");
    }
}
