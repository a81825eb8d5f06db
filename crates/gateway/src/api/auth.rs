//! Access-key login endpoints.
//!
//! HTTP sessions are stateless: login only checks the key and returns the
//! identity, and every later request re-presents the key as a bearer
//! token (see [`super::guard`]).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cg_domain::identity::{Identity, IdentityClass, IdentityProfile};
use cg_domain::trace::TraceEvent;
use cg_sessions::lifecycle::format_remaining;
use cg_sessions::{AuthOutcome, SessionLifecycleManager};

use super::api_error;
use super::guard::AuthedIdentity;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Views
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Identity as returned by the API. Never carries the access key.
#[derive(Debug, Serialize)]
pub struct IdentityView {
    pub id: String,
    pub display_name: String,
    pub class: IdentityClass,
    pub issued_at: DateTime<Utc>,
    /// `None` for identities that never expire.
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<i64>,
    pub remaining: Option<String>,
    pub has_persona_override: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<IdentityProfile>,
}

impl IdentityView {
    pub fn new(identity: &Identity, access: &SessionLifecycleManager) -> Self {
        let left = access.remaining_ttl(identity);
        Self {
            id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            class: identity.class,
            issued_at: identity.issued_at,
            expires_at: access.policy().expires_at(identity),
            remaining_seconds: left.map(|d| d.num_seconds()),
            remaining: left.map(format_remaining),
            has_persona_override: identity.persona_overrides.is_some(),
            profile: identity.profile.clone(),
        }
    }
}

/// Display-facing persona fields for a logged-in identity.
#[derive(Debug, Serialize)]
pub struct PersonaView {
    pub assistant_name: String,
    pub developer_name: String,
    pub avatar_url: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub identity: IdentityView,
    pub persona: PersonaView,
}

fn session_response(state: &AppState, identity: &Identity) -> SessionResponse {
    let resolved = state.settings.resolve_for(identity);
    SessionResponse {
        identity: IdentityView::new(identity, &state.access),
        persona: PersonaView {
            assistant_name: resolved.assistant_name,
            developer_name: resolved.developer_name,
            avatar_url: resolved.avatar_url,
        },
    }
}

fn finish_login(state: &AppState, class: IdentityClass, outcome: AuthOutcome) -> Response {
    match outcome {
        AuthOutcome::Granted(identity) => {
            tracing::info!(identity_id = %identity.id, class = %identity.class, "login accepted");
            Json(session_response(state, &identity)).into_response()
        }
        AuthOutcome::Denied(reason) => {
            TraceEvent::SessionRejected {
                class: class.to_string(),
                reason: reason.code().to_string(),
            }
            .emit();
            api_error(StatusCode::UNAUTHORIZED, reason.as_str())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/auth/login
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub access_key: String,
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Response {
    let outcome = state
        .access
        .authenticate(body.access_key.trim(), IdentityClass::Standard);
    finish_login(&state, IdentityClass::Standard, outcome)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/auth/admin-login
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub display_name: String,
    pub access_key: String,
}

pub async fn admin_login(
    State(state): State<AppState>,
    Json(body): Json<AdminLoginRequest>,
) -> Response {
    let outcome = state
        .access
        .authenticate_privileged(body.display_name.trim(), body.access_key.trim());
    finish_login(&state, IdentityClass::Privileged, outcome)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/auth/me
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn me(
    AuthedIdentity(identity): AuthedIdentity,
    State(state): State<AppState>,
) -> impl IntoResponse {
    Json(session_response(&state, &identity))
}
