//! AppState construction and background-task spawning.
//!
//! Shared by `serve`, `chat`, `run`, `login` and the admin commands so
//! every entry point boots the same stores.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use cg_domain::config::{Config, ConfigSeverity, PointerBackend};
use cg_providers::{credentials_from_env, Dispatcher, GeminiBackend, GenerationBackend};
use cg_sessions::{
    AccessGate, ChatLogStore, ExpiryPolicy, FilePointer, IdentityStore, JsonIdentityStore,
    JsonlChatLog, KeychainPointer, SessionLifecycleManager, SessionPointer, SystemClock,
};

use crate::runtime::{spawn_listener, ChangeFeed, ChatTurnService, SettingsStore};
use crate::state::AppState;

/// Validate config, open every store and return a fully-wired
/// [`AppState`] talking to the configured upstream.
pub fn build_app_state(
    config: Arc<Config>,
    config_path: PathBuf,
    shutdown_tx: Arc<tokio::sync::Notify>,
) -> anyhow::Result<AppState> {
    let backend: Arc<dyn GenerationBackend> = Arc::new(
        GeminiBackend::from_config(&config.upstream).context("initializing upstream backend")?,
    );
    build_app_state_with(config, config_path, shutdown_tx, backend)
}

/// Same as [`build_app_state`] with an explicit generation backend.
pub fn build_app_state_with(
    config: Arc<Config>,
    config_path: PathBuf,
    shutdown_tx: Arc<tokio::sync::Notify>,
    backend: Arc<dyn GenerationBackend>,
) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }

    // ── Identities & access checks ───────────────────────────────────
    let store = Arc::new(
        JsonIdentityStore::open(&config.storage.identities_file())
            .context("opening identity store")?,
    );
    let identities: Arc<dyn IdentityStore> = store;
    let access = Arc::new(SessionLifecycleManager::new(
        identities.clone(),
        Arc::new(SystemClock),
        ExpiryPolicy::new(config.access.standard_ttl()),
    ));
    tracing::info!(
        ttl_hours = config.access.standard_ttl_hours,
        identities = identities.list().len(),
        "access control ready"
    );

    // ── Global settings & credential pool ────────────────────────────
    let settings = Arc::new(
        SettingsStore::open(&config.storage.settings_file(), || {
            config
                .persona
                .seed_settings(credentials_from_env(&config.upstream.credential_envs))
        })
        .context("opening settings store")?,
    );
    if settings.pool().is_empty() {
        tracing::warn!(
            "credential pool is empty; add keys with `centralgate admin pool-add` or set {}",
            config.upstream.credential_envs.join(", ")
        );
    } else {
        tracing::info!(pool_size = settings.pool().len(), "credential pool ready");
    }

    // ── Chat log ─────────────────────────────────────────────────────
    let chat_log: Arc<dyn ChatLogStore> = Arc::new(
        JsonlChatLog::open(&config.storage.chatlog_dir()).context("opening chat log")?,
    );

    // ── Dispatch & turns ─────────────────────────────────────────────
    let dispatcher = Arc::new(Dispatcher::from_config(backend, &config.upstream));
    let turns = Arc::new(ChatTurnService::new(
        dispatcher,
        settings.clone(),
        chat_log.clone(),
    ));
    tracing::info!(
        base_url = %config.upstream.base_url,
        model = %config.upstream.model,
        selection = ?config.upstream.selection,
        "chat runtime ready"
    );

    Ok(AppState {
        config,
        config_path,
        identities,
        access,
        settings,
        chat_log,
        turns,
        changes: ChangeFeed::new(),
        shutdown_tx,
    })
}

/// Spawn long-lived background loops (server and REPL only).
pub fn spawn_background_tasks(state: &AppState) {
    // ── Change listener ──────────────────────────────────────────────
    spawn_listener(&state.changes, state.settings.clone(), state.identities.clone());
    tracing::info!("change listener started");
}

/// The session pointer selected by `[access]`.
pub fn session_pointer(config: &Config) -> anyhow::Result<Arc<dyn SessionPointer>> {
    let pointer: Arc<dyn SessionPointer> = match config.access.session_pointer {
        PointerBackend::File => {
            let path = match &config.access.pointer_path {
                Some(p) => p.clone(),
                None => FilePointer::default_path().context("resolving session pointer path")?,
            };
            Arc::new(FilePointer::new(path))
        }
        PointerBackend::Keychain => Arc::new(KeychainPointer::default()),
    };
    Ok(pointer)
}

/// An access gate for this process, bound to the configured pointer.
pub fn access_gate(state: &AppState) -> anyhow::Result<AccessGate> {
    let pointer = session_pointer(&state.config)?;
    Ok(AccessGate::new(state.access.clone(), pointer))
}
