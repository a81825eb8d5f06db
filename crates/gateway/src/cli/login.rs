//! `centralgate login | logout | whoami`: the persisted CLI session.
//!
//! The access key is prompted without echo. On success the configured
//! session pointer remembers it so `chat`, `run` and the admin commands
//! can restore the session later.

use anyhow::Context;

use cg_domain::identity::{Identity, IdentityClass};
use cg_sessions::lifecycle::format_remaining;
use cg_sessions::AuthOutcome;

use crate::bootstrap;
use crate::state::AppState;

/// Prompt for a key (and use `admin` as the operator name when given).
pub async fn login(state: &AppState, admin: Option<String>) -> anyhow::Result<()> {
    let key = prompt_secret("Access key: ")?;
    let gate = bootstrap::access_gate(state)?;

    let outcome = match admin.as_deref() {
        Some(name) => gate.authenticate_privileged(name, &key).await,
        None => gate.authenticate(&key, IdentityClass::Standard).await,
    }
    .context("storing session")?;

    match outcome {
        AuthOutcome::Granted(identity) => {
            println!("Logged in as {} ({})", identity.display_name, identity.class);
            print_remaining(state, &identity);
            Ok(())
        }
        AuthOutcome::Denied(reason) => anyhow::bail!("{reason}"),
    }
}

pub async fn logout(state: &AppState) -> anyhow::Result<()> {
    let gate = bootstrap::access_gate(state)?;
    gate.end_session().await.context("clearing session")?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(state: &AppState) -> anyhow::Result<()> {
    let gate = bootstrap::access_gate(state)?;
    match gate.restore_session().await.context("restoring session")? {
        Some(identity) => {
            println!("{} ({})", identity.display_name, identity.class);
            println!("id: {}", identity.id);
            print_remaining(state, &identity);
        }
        None => println!("Not logged in"),
    }
    Ok(())
}

/// Restore the persisted session or fail with a hint to log in.
pub async fn require_session(state: &AppState) -> anyhow::Result<Identity> {
    let gate = bootstrap::access_gate(state)?;
    gate.restore_session()
        .await
        .context("restoring session")?
        .ok_or_else(|| anyhow::anyhow!("not logged in (run `centralgate login`)"))
}

/// Read a secret from the terminal without echo.
pub fn prompt_secret(prompt: &str) -> anyhow::Result<String> {
    let value = rpassword::prompt_password_stderr(prompt).context("reading secret")?;
    let value = value.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("value must not be empty");
    }
    Ok(value)
}

fn print_remaining(state: &AppState, identity: &Identity) {
    match state.access.remaining_ttl(identity) {
        Some(left) => println!("Session expires in {}", format_remaining(left)),
        None => println!("Session does not expire"),
    }
}
