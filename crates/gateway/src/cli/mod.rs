pub mod admin;
pub mod chat;
pub mod config;
pub mod login;
pub mod pid;
pub mod run;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use cg_domain::chat::Attachment;

/// CentralGate: access-controlled chat gateway.
#[derive(Debug, Parser)]
#[command(name = "centralgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Log in with an access key and remember the session.
    Login {
        /// Log in as an operator with this display name.
        #[arg(long)]
        admin: Option<String>,
    },
    /// End the current session.
    Logout,
    /// Show the identity of the current session and its remaining time.
    Whoami,
    /// Interactive chat on the current session.
    Chat,
    /// Send a single message and print the reply.
    Run {
        /// The message to send.
        message: String,
        /// Attach a file (repeatable).
        #[arg(long)]
        attach: Vec<PathBuf>,
        /// Output the full outcome as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Operator commands (require a privileged session).
    #[command(subcommand)]
    Admin(AdminCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// Create the first operator identity. Refuses when one already exists.
    Bootstrap {
        /// Operator display name.
        name: String,
    },
    #[command(flatten)]
    Operator(OperatorCommand),
}

/// Admin commands that run on a restored privileged session.
#[derive(Debug, Subcommand)]
pub enum OperatorCommand {
    /// Issue a new identity and print its access key.
    Issue {
        /// Display name of the new identity.
        name: String,
        /// Issue a privileged (operator) identity.
        #[arg(long)]
        admin: bool,
        /// Give the identity its own persona copied from the global settings.
        #[arg(long)]
        custom_persona: bool,
        /// Assistant name for the custom persona.
        #[arg(long, default_value = "")]
        assistant_name: String,
        /// Developer name for the custom persona.
        #[arg(long, default_value = "")]
        developer_name: String,
    },
    /// Revoke an identity and purge its chat log.
    Revoke {
        /// Identity id.
        id: String,
    },
    /// List identities.
    List,
    /// Add an upstream credential to the shared pool (prompted).
    PoolAdd,
    /// Remove a pool credential by fingerprint.
    PoolRemove {
        fingerprint: String,
    },
    /// List pool credentials (fingerprints only).
    PoolList,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `CG_CONFIG` (or `config.toml`
/// by default). Returns the parsed [`Config`] and the path that was used.
///
/// A missing file yields the defaults.
///
/// [`Config`]: cg_domain::config::Config
pub fn load_config() -> anyhow::Result<(cg_domain::config::Config, PathBuf)> {
    let config_path =
        PathBuf::from(std::env::var("CG_CONFIG").unwrap_or_else(|_| "config.toml".into()));

    let config = if config_path.exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", config_path.display()))?;
        toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {}: {e}", config_path.display()))?
    } else {
        cg_domain::config::Config::default()
    };

    Ok((config, config_path))
}

// ── Attachments ───────────────────────────────────────────────────────

/// Read a file from disk as an inline attachment.
pub fn read_attachment(path: &Path) -> anyhow::Result<Attachment> {
    let data = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("reading attachment {}: {e}", path.display()))?;
    Ok(Attachment::new(guess_mime(path), data))
}

/// MIME type from the file extension. Unknown extensions are sent as
/// `application/octet-stream`.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
