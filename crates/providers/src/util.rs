//! Shared helpers for the upstream adapter and the credential pool.

use cg_domain::error::Error;
use sha2::{Digest as _, Sha256};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    // reqwest embeds the request URL (and with it the API key) in its
    // Display output.
    let e = e.without_url();
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Redact the `key=` query parameter from a URL for logging.
pub(crate) fn redact_url_key(url: &str) -> String {
    if let Some(idx) = url.find("key=") {
        let prefix = &url[..idx + 4];
        let rest = &url[idx + 4..];
        let end = rest.find('&').unwrap_or(rest.len());
        format!("{prefix}[REDACTED]{}", &rest[end..])
    } else {
        url.to_string()
    }
}

/// Short stable identifier of a secret: first 12 hex chars of its SHA-256.
pub(crate) fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(12);
    hex
}

/// `AIza…wxyz` style mask for display. Short secrets are fully hidden.
pub(crate) fn mask_secret(s: &str) -> String {
    let trimmed = s.trim();
    let n = trimmed.chars().count();
    if n <= 10 {
        return "****".to_string();
    }
    let head: String = trimmed.chars().take(4).collect();
    let tail: String = trimmed.chars().skip(n - 4).collect();
    format!("{head}…{tail}")
}

/// Cap an upstream error body so it stays readable in logs.
pub(crate) fn truncate_body(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let mut out: String = body.chars().take(max_chars).collect();
    out.push('…');
    out
}

/// Read credential values from the named environment variables.
///
/// Unset and blank variables are skipped; duplicates keep their first
/// position.
pub fn credentials_from_env(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        match std::env::var(name) {
            Ok(val) if !val.trim().is_empty() => {
                let val = val.trim().to_string();
                if !out.contains(&val) {
                    out.push(val);
                }
            }
            _ => {
                tracing::debug!(env_var = %name, "credential env var not set, skipping");
            }
        }
    }
    out
}
