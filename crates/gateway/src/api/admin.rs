//! Administrative endpoints: identities, the shared credential pool and
//! global persona settings.
//!
//! Every handler takes a [`PrivilegedGuard`]. Each successful mutation
//! publishes a change cue so the background listener reloads the stores.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use cg_domain::identity::{generate_access_key, Identity, IdentityClass, IdentityProfile};
use cg_domain::persona::PersonaOverrides;

use super::auth::IdentityView;
use super::guard::PrivilegedGuard;
use super::{api_error, error_response};
use crate::runtime::SettingsPatch;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identities
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_identities(
    _guard: PrivilegedGuard,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let views: Vec<IdentityView> = state
        .identities
        .list()
        .iter()
        .map(|i| IdentityView::new(i, &state.access))
        .collect();
    Json(serde_json::json!({ "identities": views, "total": views.len() }))
}

#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    pub display_name: String,
    #[serde(default = "d_class")]
    pub class: IdentityClass,
    #[serde(default)]
    pub profile: Option<IdentityProfile>,
    /// Give the identity its own persona, seeded from the global settings.
    #[serde(default)]
    pub custom_persona: bool,
    #[serde(default)]
    pub assistant_name: String,
    #[serde(default)]
    pub developer_name: String,
}

fn d_class() -> IdentityClass {
    IdentityClass::Standard
}

#[derive(Debug, Serialize)]
pub struct IssueResponse {
    pub identity: IdentityView,
    /// Shown once; the API never returns it again.
    pub access_key: String,
}

/// Build a new identity with a fresh key. Shared with the CLI.
pub fn new_identity(state: &AppState, req: IssueRequest) -> Identity {
    let mut identity = Identity::new(
        req.display_name.trim(),
        generate_access_key(),
        req.class,
        Utc::now(),
    );
    identity.profile = req.profile;
    if req.custom_persona {
        identity.persona_overrides = Some(
            state
                .settings
                .snapshot()
                .derive_overrides(&req.assistant_name, &req.developer_name),
        );
    }
    identity
}

pub async fn issue_identity(
    PrivilegedGuard(admin): PrivilegedGuard,
    State(state): State<AppState>,
    Json(body): Json<IssueRequest>,
) -> Response {
    if body.display_name.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "display_name must not be empty");
    }
    let identity = new_identity(&state, body);
    let access_key = identity.secret.clone();
    if let Err(e) = state.identities.insert(identity.clone()) {
        return error_response(&e);
    }
    tracing::info!(
        admin_id = %admin.id,
        identity_id = %identity.id,
        class = %identity.class,
        "identity issued"
    );
    state.changes.publish("identities");
    (
        StatusCode::CREATED,
        Json(IssueResponse {
            identity: IdentityView::new(&identity, &state.access),
            access_key,
        }),
    )
        .into_response()
}

pub async fn revoke_identity(
    PrivilegedGuard(admin): PrivilegedGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    if id == admin.id {
        return api_error(StatusCode::CONFLICT, "cannot revoke the identity making the request");
    }
    let removed = match state.identities.delete(&id) {
        Ok(i) => i,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = state.chat_log.purge(&removed.id).await {
        tracing::warn!(identity_id = %removed.id, error = %e, "chat log purge failed");
    }
    tracing::info!(admin_id = %admin.id, identity_id = %removed.id, "identity revoked");
    state.changes.publish("identities");
    Json(serde_json::json!({ "revoked": removed.id })).into_response()
}

pub async fn update_overrides(
    _guard: PrivilegedGuard,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(overrides): Json<Option<PersonaOverrides>>,
) -> Response {
    match state.identities.update_overrides(&id, overrides) {
        Ok(identity) => {
            state.changes.publish("identities");
            Json(IdentityView::new(&identity, &state.access)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credential pool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_credentials(
    _guard: PrivilegedGuard,
    State(state): State<AppState>,
) -> impl IntoResponse {
    Json(serde_json::json!({ "credentials": state.settings.pool().describe() }))
}

#[derive(Debug, Deserialize)]
pub struct AddCredentialRequest {
    pub key: String,
}

pub async fn add_credential(
    _guard: PrivilegedGuard,
    State(state): State<AppState>,
    Json(body): Json<AddCredentialRequest>,
) -> Response {
    match state.settings.add_credential(&body.key) {
        Ok(info) => {
            tracing::info!(fingerprint = %info.fingerprint, index = info.index, "credential added");
            state.changes.publish("credentials");
            (StatusCode::CREATED, Json(info)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub async fn remove_credential(
    _guard: PrivilegedGuard,
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> Response {
    match state.settings.remove_credential(&fingerprint) {
        Ok(true) => {
            tracing::info!(fingerprint = %fingerprint, "credential removed");
            state.changes.publish("credentials");
            Json(serde_json::json!({ "removed": fingerprint })).into_response()
        }
        Ok(false) => api_error(StatusCode::NOT_FOUND, "credential not found"),
        Err(e) => error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Global settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn settings_view(state: &AppState) -> serde_json::Value {
    let s = state.settings.snapshot();
    serde_json::json!({
        "assistant_name": s.assistant_name,
        "developer_name": s.developer_name,
        "persona": s.persona,
        "avatar_url": s.avatar_url,
        "pool_size": s.credentials.len(),
    })
}

pub async fn get_settings(_guard: PrivilegedGuard, State(state): State<AppState>) -> Response {
    Json(settings_view(&state)).into_response()
}

pub async fn update_settings(
    _guard: PrivilegedGuard,
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> Response {
    match state.settings.update_persona(patch) {
        Ok(_) => {
            state.changes.publish("settings");
            Json(settings_view(&state)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Ask the background listener to reload settings and identities.
pub async fn refresh(_guard: PrivilegedGuard, State(state): State<AppState>) -> Response {
    state.changes.publish("refresh");
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "refresh": "queued" })),
    )
        .into_response()
}
