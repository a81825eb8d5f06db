use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::persona::{GlobalSettings, DEFAULT_ASSISTANT_NAME, DEFAULT_DEVELOPER_NAME, DEFAULT_PERSONA};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// On-disk layout under `state_path`:
///
/// ```text
/// identities.json
/// settings.json
/// chatlogs/<identity_id>.jsonl
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
        }
    }
}

impl StorageConfig {
    pub fn identities_file(&self) -> PathBuf {
        self.state_path.join("identities.json")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.state_path.join("settings.json")
    }

    pub fn chatlog_dir(&self) -> PathBuf {
        self.state_path.join("chatlogs")
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./data/state")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persona defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Seed values for the global settings document. Only consulted when
/// `settings.json` does not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "d_assistant_name")]
    pub assistant_name: String,
    #[serde(default = "d_developer_name")]
    pub developer_name: String,
    #[serde(default = "d_persona")]
    pub persona: String,
    #[serde(default)]
    pub avatar_url: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            assistant_name: d_assistant_name(),
            developer_name: d_developer_name(),
            persona: d_persona(),
            avatar_url: String::new(),
        }
    }
}

impl PersonaConfig {
    /// Initial global settings with the given credential pool.
    pub fn seed_settings(&self, credentials: Vec<String>) -> GlobalSettings {
        GlobalSettings {
            assistant_name: self.assistant_name.clone(),
            persona: self.persona.clone(),
            developer_name: self.developer_name.clone(),
            avatar_url: self.avatar_url.clone(),
            credentials,
        }
    }
}

fn d_assistant_name() -> String {
    DEFAULT_ASSISTANT_NAME.into()
}
fn d_developer_name() -> String {
    DEFAULT_DEVELOPER_NAME.into()
}
fn d_persona() -> String {
    DEFAULT_PERSONA.into()
}
