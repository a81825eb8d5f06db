pub mod admin;
pub mod auth;
pub mod chat;
pub mod guard;
pub mod health;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;

use cg_domain::error::Error;

use crate::state::AppState;

/// Build the full API router.
///
/// Public routes need no key. Chat and `/v1/auth/me` take the caller's
/// access key as a bearer token; admin routes additionally require a
/// Privileged identity. Both checks are extractors (see [`guard`]).
pub fn router() -> Router<AppState> {
    let public = Router::new()
        .route("/v1/health", get(health::health))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/admin-login", post(auth::admin_login));

    let identity = Router::new()
        .route("/v1/auth/me", get(auth::me))
        .route("/v1/chat", post(chat::chat))
        .route("/v1/chat/history", get(chat::history));

    let admin = Router::new()
        .route(
            "/v1/admin/identities",
            get(admin::list_identities).post(admin::issue_identity),
        )
        .route("/v1/admin/identities/:id", delete(admin::revoke_identity))
        .route(
            "/v1/admin/identities/:id/overrides",
            put(admin::update_overrides),
        )
        .route(
            "/v1/admin/credentials",
            get(admin::list_credentials).post(admin::add_credential),
        )
        .route(
            "/v1/admin/credentials/:fingerprint",
            delete(admin::remove_credential),
        )
        .route(
            "/v1/admin/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .route("/v1/admin/refresh", post(admin::refresh));

    public.merge(identity).merge(admin)
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Map a domain error onto a status code. Internal failures are logged
/// and reported without detail.
pub(crate) fn error_response(e: &Error) -> Response {
    let status = match e {
        Error::EmptyTurn | Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::Auth(_) => StatusCode::UNAUTHORIZED,
        Error::Forbidden(_) => StatusCode::FORBIDDEN,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        _ => {
            tracing::error!(error = %e, "request failed");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    };
    api_error(status, e.to_string())
}
