//! Access-key expiry.
//!
//! Expiry is evaluated lazily: nothing sweeps or revokes keys in the
//! background. Every check calls [`ExpiryPolicy::is_expired`] with an
//! explicit `now`, so the rule is testable without a real clock.

use chrono::{DateTime, Duration, Utc};

use cg_domain::identity::{Identity, IdentityClass};

/// Default lifetime of a Standard access key.
pub const STANDARD_TTL_HOURS: i64 = 24;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Clock
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for tests and simulations.
#[derive(Debug)]
pub struct FixedClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: parking_lot::Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock();
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Expiry policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Time-to-live rule per identity class.
///
/// Standard keys live for `standard_ttl` from issuance, the boundary itself
/// counting as expired. Privileged identities never expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub standard_ttl: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            standard_ttl: Duration::hours(STANDARD_TTL_HOURS),
        }
    }
}

impl ExpiryPolicy {
    pub fn new(standard_ttl: Duration) -> Self {
        Self { standard_ttl }
    }

    pub fn is_expired(&self, identity: &Identity, now: DateTime<Utc>) -> bool {
        match identity.class {
            IdentityClass::Privileged => false,
            IdentityClass::Standard => now - identity.issued_at >= self.standard_ttl,
        }
    }

    /// Time left before expiry, or `None` for identities that never
    /// expire. Already expired keys report zero.
    pub fn remaining_ttl(&self, identity: &Identity, now: DateTime<Utc>) -> Option<Duration> {
        match identity.class {
            IdentityClass::Privileged => None,
            IdentityClass::Standard => {
                let left = identity.issued_at + self.standard_ttl - now;
                Some(left.max(Duration::zero()))
            }
        }
    }

    pub fn expires_at(&self, identity: &Identity) -> Option<DateTime<Utc>> {
        match identity.class {
            IdentityClass::Privileged => None,
            IdentityClass::Standard => Some(identity.issued_at + self.standard_ttl),
        }
    }
}

/// [`ExpiryPolicy::is_expired`] with the default 24h lifetime.
pub fn is_expired(identity: &Identity, now: DateTime<Utc>) -> bool {
    ExpiryPolicy::default().is_expired(identity, now)
}

/// [`ExpiryPolicy::remaining_ttl`] with the default 24h lifetime.
pub fn remaining_ttl(identity: &Identity, now: DateTime<Utc>) -> Option<Duration> {
    ExpiryPolicy::default().remaining_ttl(identity, now)
}

/// `"5h 12m"` style rendering for CLI and API display.
pub fn format_remaining(left: Duration) -> String {
    let mins = left.num_minutes().max(0);
    format!("{}h {}m", mins / 60, mins % 60)
}
