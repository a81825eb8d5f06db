//! The single-session access gate.
//!
//! One [`AccessGate`] per execution context (a CLI process, a REPL). It
//! owns the session slot and the persisted pointer; every transition goes
//! through the slot mutex so logins, restores and logouts never interleave.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use cg_domain::error::Result;
use cg_domain::identity::{Identity, IdentityClass};
use cg_domain::trace::TraceEvent;

use crate::manager::{AuthOutcome, SessionLifecycleManager};
use crate::pointer::SessionPointer;

/// The authenticated state of a gate.
#[derive(Debug, Clone)]
pub struct Session {
    /// Snapshot of the identity at login time.
    pub identity: Identity,
    /// When this session began. Differs from `issued_at` after a restore.
    pub established_at: DateTime<Utc>,
}

pub struct AccessGate {
    manager: Arc<SessionLifecycleManager>,
    pointer: Arc<dyn SessionPointer>,
    slot: Mutex<Option<Session>>,
}

impl AccessGate {
    pub fn new(manager: Arc<SessionLifecycleManager>, pointer: Arc<dyn SessionPointer>) -> Self {
        Self {
            manager,
            pointer,
            slot: Mutex::new(None),
        }
    }

    pub fn manager(&self) -> &Arc<SessionLifecycleManager> {
        &self.manager
    }

    /// Log in with an access key of the declared class.
    ///
    /// Wrong or expired keys come back as [`AuthOutcome::Denied`] and leave
    /// the current state untouched; only pointer I/O fails with `Err`.
    pub async fn authenticate(&self, secret: &str, class: IdentityClass) -> Result<AuthOutcome> {
        let mut slot = self.slot.lock().await;
        let outcome = self.manager.authenticate(secret, class);
        self.apply(&mut slot, secret, &outcome, class)?;
        Ok(outcome)
    }

    /// Operator login with display name and key.
    pub async fn authenticate_privileged(
        &self,
        display_name: &str,
        secret: &str,
    ) -> Result<AuthOutcome> {
        let mut slot = self.slot.lock().await;
        let outcome = self.manager.authenticate_privileged(display_name, secret);
        self.apply(&mut slot, secret, &outcome, IdentityClass::Privileged)?;
        Ok(outcome)
    }

    /// Resume the session named by the persisted pointer, if it is still
    /// valid. A stale pointer is cleared.
    pub async fn restore_session(&self) -> Result<Option<Identity>> {
        let mut slot = self.slot.lock().await;
        let Some(secret) = self.pointer.load()? else {
            return Ok(None);
        };

        match self.manager.validate(&secret) {
            AuthOutcome::Granted(identity) => {
                TraceEvent::SessionEstablished {
                    identity_id: identity.id.clone(),
                    class: identity.class.to_string(),
                    restored: true,
                }
                .emit();
                *slot = Some(Session {
                    identity: identity.clone(),
                    established_at: self.manager.now(),
                });
                Ok(Some(identity))
            }
            AuthOutcome::Denied(reason) => {
                tracing::info!(reason = reason.code(), "stored session no longer valid, clearing");
                self.pointer.clear()?;
                *slot = None;
                Ok(None)
            }
        }
    }

    /// The identity of the active session, if any.
    ///
    /// The TTL is not re-checked here; callers that need a fresh answer use
    /// [`AccessGate::revalidate`].
    pub async fn current_identity(&self) -> Option<Identity> {
        self.slot.lock().await.as_ref().map(|s| s.identity.clone())
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.slot.lock().await.clone()
    }

    /// Time left on the active session's key. `None` when unauthenticated
    /// or when the identity never expires.
    pub async fn remaining_ttl(&self) -> Option<Duration> {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .and_then(|s| self.manager.remaining_ttl(&s.identity))
    }

    /// Re-check the active session against the store and the clock. An
    /// invalid session is ended.
    pub async fn revalidate(&self) -> Result<Option<Identity>> {
        let mut slot = self.slot.lock().await;
        let Some((secret, id)) = slot
            .as_ref()
            .map(|s| (s.identity.secret.clone(), s.identity.id.clone()))
        else {
            return Ok(None);
        };
        match self.manager.validate(&secret) {
            AuthOutcome::Granted(identity) => {
                if let Some(s) = slot.as_mut() {
                    s.identity = identity.clone();
                }
                Ok(Some(identity))
            }
            AuthOutcome::Denied(reason) => {
                tracing::info!(identity_id = %id, reason = reason.code(), "session revalidation failed");
                self.pointer.clear()?;
                *slot = None;
                TraceEvent::SessionEnded {
                    identity_id: Some(id),
                }
                .emit();
                Ok(None)
            }
        }
    }

    /// Log out. Safe to call when already logged out.
    pub async fn end_session(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        let previous = slot.take();
        self.pointer.clear()?;
        TraceEvent::SessionEnded {
            identity_id: previous.map(|s| s.identity.id),
        }
        .emit();
        Ok(())
    }

    fn apply(
        &self,
        slot: &mut Option<Session>,
        secret: &str,
        outcome: &AuthOutcome,
        class: IdentityClass,
    ) -> Result<()> {
        match outcome {
            AuthOutcome::Granted(identity) => {
                self.pointer.save(secret)?;
                *slot = Some(Session {
                    identity: identity.clone(),
                    established_at: self.manager.now(),
                });
                TraceEvent::SessionEstablished {
                    identity_id: identity.id.clone(),
                    class: identity.class.to_string(),
                    restored: false,
                }
                .emit();
            }
            AuthOutcome::Denied(reason) => {
                TraceEvent::SessionRejected {
                    class: class.to_string(),
                    reason: reason.code().to_string(),
                }
                .emit();
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate").finish_non_exhaustive()
    }
}
