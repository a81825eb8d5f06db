use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Access keys & session pointer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Lifetime of a Standard access key, counted from issuance.
    #[serde(default = "d_ttl_hours")]
    pub standard_ttl_hours: u64,
    /// Where the CLI remembers the active session.
    #[serde(default)]
    pub session_pointer: PointerBackend,
    /// File used by the `file` backend. Defaults to
    /// `~/.centralgate/active_session`.
    #[serde(default)]
    pub pointer_path: Option<PathBuf>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            standard_ttl_hours: d_ttl_hours(),
            session_pointer: PointerBackend::default(),
            pointer_path: None,
        }
    }
}

impl AccessConfig {
    pub fn standard_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.standard_ttl_hours as i64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerBackend {
    #[default]
    File,
    /// OS keychain via `keyring`.
    Keychain,
}

fn d_ttl_hours() -> u64 {
    24
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttl_is_one_day() {
        let cfg = AccessConfig::default();
        assert_eq!(cfg.standard_ttl(), chrono::Duration::hours(24));
        assert_eq!(cfg.session_pointer, PointerBackend::File);
    }

    #[test]
    fn keychain_backend_parses() {
        let cfg: AccessConfig = toml::from_str(r#"session_pointer = "keychain""#).unwrap();
        assert_eq!(cfg.session_pointer, PointerBackend::Keychain);
    }
}
