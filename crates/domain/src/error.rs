/// Shared error type used across all CentralGate crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level failure talking to the upstream (connect, reset, TLS).
    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// The upstream answered with a non-success HTTP status.
    #[error("upstream {provider}: HTTP {status} - {message}")]
    Upstream {
        provider: String,
        status: u16,
        message: String,
    },

    /// The upstream reported success but produced no usable text.
    #[error("upstream {provider}: empty output")]
    EmptyOutput { provider: String },

    /// The upstream response could not be interpreted.
    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("message cannot be empty")]
    EmptyTurn,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
