//! `centralgate run`: one-shot turn on the restored session.
//!
//! The persisted history is replayed as context, the reply goes to stdout
//! and diagnostics to stderr.

use std::path::PathBuf;

use anyhow::Context;

use super::login::require_session;
use super::read_attachment;
use crate::state::AppState;

/// Send a single message and print the outcome.
///
/// Exits non-zero when the assistant was unavailable, so scripts can tell
/// a notice from a reply.
pub async fn run(
    state: AppState,
    message: String,
    attach: Vec<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let identity = require_session(&state).await?;

    let attachments = attach
        .iter()
        .map(|p| read_attachment(p))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let prior = state.turns.history(&identity.id).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "history unavailable, sending turn without it");
        Vec::new()
    });

    let outcome = state
        .turns
        .submit_turn(&identity, &prior, &message, &attachments)
        .await
        .context("submitting turn")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.is_reply() {
        println!("{}", outcome.display_text());
    } else {
        eprintln!("{}", outcome.display_text());
    }

    if !outcome.is_reply() {
        std::process::exit(2);
    }
    Ok(())
}
