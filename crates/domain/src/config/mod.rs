mod access;
mod observability;
mod server;
mod storage;
mod upstream;

pub use access::*;
pub use observability::*;
pub use server::*;
pub use storage::*;
pub use upstream::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration. An empty vec means no issues.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.max_concurrent_requests == 0 {
            errors.push(ConfigError::error(
                "server.max_concurrent_requests",
                "must be greater than 0",
            ));
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*" {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }
        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 || rl.burst_size == 0 {
                errors.push(ConfigError::error(
                    "server.rate_limit",
                    "requests_per_second and burst_size must be greater than 0",
                ));
            }
        }

        if self.upstream.base_url.is_empty() {
            errors.push(ConfigError::error("upstream.base_url", "base_url must not be empty"));
        } else if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            errors.push(ConfigError::error(
                "upstream.base_url",
                "base_url must start with http:// or https://",
            ));
        }
        if self.upstream.model.is_empty() {
            errors.push(ConfigError::error("upstream.model", "model must not be empty"));
        }
        if self.upstream.attempt_timeout_ms == 0 {
            errors.push(ConfigError::error(
                "upstream.attempt_timeout_ms",
                "attempt timeout must be greater than 0",
            ));
        }
        let seeded = self
            .upstream
            .credential_envs
            .iter()
            .filter(|name| std::env::var(name).is_ok_and(|v| !v.trim().is_empty()))
            .count();
        if seeded == 0 {
            errors.push(ConfigError::warning(
                "upstream.credential_envs",
                "no credential environment variable is set; the pool must be filled via admin commands",
            ));
        }

        if self.access.standard_ttl_hours == 0 {
            errors.push(ConfigError::error(
                "access.standard_ttl_hours",
                "standard access keys would expire immediately",
            ));
        }

        if self.storage.state_path.as_os_str().is_empty() {
            errors.push(ConfigError::error("storage.state_path", "state_path must not be empty"));
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample_rate must be between 0.0 and 1.0",
            ));
        }

        errors
    }
}
