use std::path::PathBuf;
use std::sync::Arc;

use cg_domain::config::Config;
use cg_sessions::{ChatLogStore, IdentityStore, SessionLifecycleManager};

use crate::runtime::{ChangeFeed, ChatTurnService, SettingsStore};

/// Shared application state passed to all API handlers and CLI commands.
///
/// Fields are grouped by concern:
/// - **Core**: config and its on-disk location
/// - **Access**: identity store and the key checks built on it
/// - **Chat**: settings, chat log and the turn service
/// - **Control**: change feed and shutdown trigger
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub config_path: PathBuf,

    // ── Access ────────────────────────────────────────────────────────
    pub identities: Arc<dyn IdentityStore>,
    pub access: Arc<SessionLifecycleManager>,

    // ── Chat ──────────────────────────────────────────────────────────
    pub settings: Arc<SettingsStore>,
    pub chat_log: Arc<dyn ChatLogStore>,
    pub turns: Arc<ChatTurnService>,

    // ── Control ───────────────────────────────────────────────────────
    /// Administrative mutations publish here; the background listener
    /// reloads stores on every cue.
    pub changes: ChangeFeed,
    /// Notified to trigger graceful shutdown of the server.
    pub shutdown_tx: Arc<tokio::sync::Notify>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config_path", &self.config_path)
            .field("settings", &self.settings)
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}
