//! Access-key checks.
//!
//! [`SessionLifecycleManager`] answers one question: does this secret
//! (optionally with a declared class and display name) currently identify
//! someone? It keeps no session state; [`crate::gate::AccessGate`] holds
//! that.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use cg_domain::identity::{Identity, IdentityClass};

use crate::lifecycle::{Clock, ExpiryPolicy};
use crate::store::IdentityStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcomes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Why an authentication attempt was refused. `Display` is the text shown
/// to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    InvalidKey,
    Expired,
    InvalidAdmin,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::InvalidKey => "Invalid access key",
            AuthFailure::Expired => "Access key expired",
            AuthFailure::InvalidAdmin => "Invalid admin credentials",
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::InvalidKey => "invalid_key",
            AuthFailure::Expired => "expired",
            AuthFailure::InvalidAdmin => "invalid_admin",
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Granted(Identity),
    Denied(AuthFailure),
}

impl AuthOutcome {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthOutcome::Granted(i) => Some(i),
            AuthOutcome::Denied(_) => None,
        }
    }

    pub fn into_identity(self) -> Option<Identity> {
        match self {
            AuthOutcome::Granted(i) => Some(i),
            AuthOutcome::Denied(_) => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionLifecycleManager {
    store: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
    policy: ExpiryPolicy,
}

impl SessionLifecycleManager {
    pub fn new(store: Arc<dyn IdentityStore>, clock: Arc<dyn Clock>, policy: ExpiryPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }

    /// Log in with an access key declared to be of `class`.
    pub fn authenticate(&self, secret: &str, class: IdentityClass) -> AuthOutcome {
        let not_found = match class {
            IdentityClass::Standard => AuthFailure::InvalidKey,
            IdentityClass::Privileged => AuthFailure::InvalidAdmin,
        };
        match self.store.find_by_secret(secret, Some(class)) {
            Some(identity) => self.check_expiry(identity),
            None => AuthOutcome::Denied(not_found),
        }
    }

    /// Operator login: display name and key must both match a Privileged
    /// identity.
    pub fn authenticate_privileged(&self, display_name: &str, secret: &str) -> AuthOutcome {
        match self
            .store
            .find_by_secret(secret, Some(IdentityClass::Privileged))
        {
            Some(identity) if identity.display_name == display_name => {
                AuthOutcome::Granted(identity)
            }
            _ => AuthOutcome::Denied(AuthFailure::InvalidAdmin),
        }
    }

    /// Check a presented key of any class. Used on every protected request
    /// and on session restore.
    pub fn validate(&self, secret: &str) -> AuthOutcome {
        match self.store.find_by_secret(secret, None) {
            Some(identity) => self.check_expiry(identity),
            None => AuthOutcome::Denied(AuthFailure::InvalidKey),
        }
    }

    pub fn is_expired(&self, identity: &Identity) -> bool {
        self.policy.is_expired(identity, self.clock.now())
    }

    pub fn remaining_ttl(&self, identity: &Identity) -> Option<Duration> {
        self.policy.remaining_ttl(identity, self.clock.now())
    }

    fn check_expiry(&self, identity: Identity) -> AuthOutcome {
        if self.is_expired(&identity) {
            AuthOutcome::Denied(AuthFailure::Expired)
        } else {
            AuthOutcome::Granted(identity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::FixedClock;
    use crate::store::JsonIdentityStore;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> (tempfile::TempDir, Arc<FixedClock>, SessionLifecycleManager) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonIdentityStore::open(&dir.path().join("identities.json")).unwrap());
        store
            .insert(Identity::new("alice", "ck_alice", IdentityClass::Standard, t0()))
            .unwrap();
        store
            .insert(Identity::new("root", "ck_root", IdentityClass::Privileged, t0()))
            .unwrap();
        let clock = Arc::new(FixedClock::new(t0()));
        let mgr = SessionLifecycleManager::new(store, clock.clone(), ExpiryPolicy::default());
        (dir, clock, mgr)
    }

    #[test]
    fn standard_key_grants_within_ttl() {
        let (_d, _c, mgr) = setup();
        let out = mgr.authenticate("ck_alice", IdentityClass::Standard);
        assert_eq!(out.identity().unwrap().display_name, "alice");
    }

    #[test]
    fn wrong_class_is_not_found() {
        let (_d, _c, mgr) = setup();
        assert!(matches!(
            mgr.authenticate("ck_root", IdentityClass::Standard),
            AuthOutcome::Denied(AuthFailure::InvalidKey)
        ));
        assert!(matches!(
            mgr.authenticate("ck_alice", IdentityClass::Privileged),
            AuthOutcome::Denied(AuthFailure::InvalidAdmin)
        ));
    }

    #[test]
    fn expired_standard_key_is_denied() {
        let (_d, clock, mgr) = setup();
        clock.set(t0() + Duration::hours(24));
        assert!(matches!(
            mgr.authenticate("ck_alice", IdentityClass::Standard),
            AuthOutcome::Denied(AuthFailure::Expired)
        ));
        assert!(matches!(
            mgr.validate("ck_alice"),
            AuthOutcome::Denied(AuthFailure::Expired)
        ));
    }

    #[test]
    fn privileged_login_needs_matching_name() {
        let (_d, clock, mgr) = setup();
        clock.set(t0() + Duration::days(400));
        assert!(mgr.authenticate_privileged("root", "ck_root").identity().is_some());
        assert!(matches!(
            mgr.authenticate_privileged("Root", "ck_root"),
            AuthOutcome::Denied(AuthFailure::InvalidAdmin)
        ));
        assert!(matches!(
            mgr.authenticate_privileged("alice", "ck_alice"),
            AuthOutcome::Denied(AuthFailure::InvalidAdmin)
        ));
    }

    #[test]
    fn failure_texts_are_user_facing() {
        assert_eq!(AuthFailure::InvalidKey.to_string(), "Invalid access key");
        assert_eq!(AuthFailure::Expired.to_string(), "Access key expired");
        assert_eq!(AuthFailure::InvalidAdmin.to_string(), "Invalid admin credentials");
    }
}
