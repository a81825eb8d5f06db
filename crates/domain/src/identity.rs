use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persona::PersonaOverrides;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Authorization class of an identity.
///
/// Serialized as `"user"` / `"admin"` so stored records stay compatible
/// with the role column of existing user tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityClass {
    /// Time-limited access key (24h from issuance by default).
    #[serde(rename = "user")]
    Standard,
    /// Operator identity with no time bound.
    #[serde(rename = "admin")]
    Privileged,
}

impl IdentityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "user",
            Self::Privileged => "admin",
        }
    }
}

impl std::fmt::Display for IdentityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form contact details recorded when an identity is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// A principal able to act in the system.
///
/// `secret` is both the bearer credential and the primary lookup key.
/// `issued_at` is fixed at creation; only `persona_overrides` and
/// `profile` change afterwards.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub secret: String,
    pub class: IdentityClass,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_overrides: Option<PersonaOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<IdentityProfile>,
}

impl Identity {
    /// Build a new identity with a fresh UUID.
    pub fn new(
        display_name: impl Into<String>,
        secret: impl Into<String>,
        class: IdentityClass,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: display_name.into(),
            secret: secret.into(),
            class,
            issued_at,
            persona_overrides: None,
            profile: None,
        }
    }

    pub fn is_privileged(&self) -> bool {
        self.class == IdentityClass::Privileged
    }
}

// Manual Debug impl to avoid leaking the access key.
impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("class", &self.class)
            .field("issued_at", &self.issued_at)
            .field("has_overrides", &self.persona_overrides.is_some())
            .finish()
    }
}

/// Generate a new access key: `ck_` followed by 12 lowercase
/// alphanumerics taken from a v4 UUID.
pub fn generate_access_key() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("ck_{}", &raw[..12])
}
