use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Upstream generation backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_model")]
    pub model: String,
    /// Budget for a single credential attempt. Exceeding it aborts the
    /// whole dispatch.
    #[serde(default = "d_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    #[serde(default)]
    pub selection: SelectionPolicy,
    /// Environment variables whose values seed the global credential pool
    /// on first boot. Unset or empty variables are skipped.
    #[serde(default = "d_credential_envs")]
    pub credential_envs: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            model: d_model(),
            attempt_timeout_ms: d_attempt_timeout_ms(),
            selection: SelectionPolicy::default(),
            credential_envs: d_credential_envs(),
        }
    }
}

/// Where a dispatch starts in the credential pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Always start at the first credential.
    #[default]
    Ordered,
    /// Start one past where the previous dispatch started.
    RoundRobin,
}

fn d_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn d_model() -> String {
    "gemini-2.5-flash".into()
}
fn d_attempt_timeout_ms() -> u64 {
    60_000
}
fn d_credential_envs() -> Vec<String> {
    vec!["GEMINI_API_KEY".into()]
}
