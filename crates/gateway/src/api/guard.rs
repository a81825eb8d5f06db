//! Bearer-key extractors.
//!
//! Handlers opt in by taking [`AuthedIdentity`] (any valid, unexpired
//! access key) or [`PrivilegedGuard`] (a Privileged identity) as a
//! parameter. The key is checked against the identity store on every
//! request; nothing is cached between requests.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Json;

use cg_domain::identity::Identity;
use cg_sessions::AuthOutcome;

use crate::state::AppState;

type Rejection = (StatusCode, Json<serde_json::Value>);

fn bearer(parts: &Parts) -> &str {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or("")
}

fn unauthorized(message: &str) -> Rejection {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
}

fn validate(parts: &Parts, state: &AppState) -> Result<Identity, Rejection> {
    let key = bearer(parts);
    if key.is_empty() {
        return Err(unauthorized("missing access key"));
    }
    match state.access.validate(key) {
        AuthOutcome::Granted(identity) => Ok(identity),
        AuthOutcome::Denied(reason) => Err(unauthorized(reason.as_str())),
    }
}

/// The identity behind a valid `Authorization: Bearer <access key>`.
pub struct AuthedIdentity(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthedIdentity {
    type Rejection = Rejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        validate(parts, state).map(AuthedIdentity)
    }
}

/// Like [`AuthedIdentity`], but only Privileged identities pass.
pub struct PrivilegedGuard(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for PrivilegedGuard {
    type Rejection = Rejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = validate(parts, state)?;
        if !identity.is_privileged() {
            tracing::info!(identity_id = %identity.id, "admin route refused for standard identity");
            return Err((
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": "admin access required" })),
            ));
        }
        Ok(PrivilegedGuard(identity))
    }
}
