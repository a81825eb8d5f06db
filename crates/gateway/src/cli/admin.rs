//! `centralgate admin ...`: operator commands against the local state.
//!
//! Everything except `bootstrap` needs a restored privileged session.
//! Changes land on disk under the shared state lock. A running server sees
//! identity changes on its next lookup and pool changes after
//! `POST /v1/admin/refresh`.

use cg_domain::identity::{Identity, IdentityClass};
use cg_sessions::lifecycle::format_remaining;

use super::login::{prompt_secret, require_session};
use super::pid::running_server;
use super::{AdminCommand, OperatorCommand};
use crate::api::admin::{new_identity, IssueRequest};
use crate::state::AppState;

pub async fn run(state: AppState, cmd: AdminCommand) -> anyhow::Result<()> {
    match cmd {
        AdminCommand::Bootstrap { name } => bootstrap(&state, &name),
        AdminCommand::Operator(op) => {
            let admin = require_session(&state).await?;
            if !admin.is_privileged() {
                anyhow::bail!(
                    "admin access required (log in with `centralgate login --admin <name>`)"
                );
            }
            operate(&state, &admin, op).await
        }
    }
}

async fn operate(state: &AppState, admin: &Identity, op: OperatorCommand) -> anyhow::Result<()> {
    match op {
        OperatorCommand::Issue {
            name,
            admin: privileged,
            custom_persona,
            assistant_name,
            developer_name,
        } => {
            let class = if privileged {
                IdentityClass::Privileged
            } else {
                IdentityClass::Standard
            };
            issue(
                state,
                IssueRequest {
                    display_name: name,
                    class,
                    profile: None,
                    custom_persona,
                    assistant_name,
                    developer_name,
                },
            )?;
        }
        OperatorCommand::Revoke { id } => {
            if id == admin.id {
                anyhow::bail!("cannot revoke the identity of the current session");
            }
            let removed = state.identities.delete(&id)?;
            if let Err(e) = state.chat_log.purge(&removed.id).await {
                eprintln!("warning: chat log purge failed: {e}");
            }
            tracing::info!(admin_id = %admin.id, identity_id = %removed.id, "identity revoked");
            println!("Revoked {} ({})", removed.display_name, removed.id);
        }
        OperatorCommand::List => {
            let mut all = state.identities.list();
            all.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
            for identity in &all {
                println!("{}", describe(state, identity));
            }
            println!("{} identit(ies)", all.len());
        }
        OperatorCommand::PoolAdd => {
            let key = prompt_secret("Upstream API key: ")?;
            let info = state.settings.add_credential(&key)?;
            println!("Added credential #{} {} ({})", info.index, info.masked, info.fingerprint);
            note_running_server(state);
        }
        OperatorCommand::PoolRemove { fingerprint } => {
            if !state.settings.remove_credential(&fingerprint)? {
                anyhow::bail!("no credential with fingerprint {fingerprint}");
            }
            println!("Removed {fingerprint}");
            note_running_server(state);
        }
        OperatorCommand::PoolList => {
            let pool = state.settings.pool().describe();
            for c in &pool {
                println!("#{:<3} {}  {}", c.index, c.masked, c.fingerprint);
            }
            println!("{} credential(s)", pool.len());
        }
    }
    Ok(())
}

/// Identity changes reach a live server on its next lookup; pool changes
/// wait for a refresh.
fn note_running_server(state: &AppState) {
    if let Some(pid) = state.config.server.pid_file.as_deref().and_then(running_server) {
        eprintln!(
            "note: server pid {pid} keeps its current pool until `POST /v1/admin/refresh`"
        );
    }
}

/// Create the first operator. Refused once any privileged identity exists.
fn bootstrap(state: &AppState, name: &str) -> anyhow::Result<()> {
    if state.identities.list().iter().any(Identity::is_privileged) {
        anyhow::bail!("an operator already exists; use `centralgate admin issue --admin`");
    }
    if name.trim().is_empty() {
        anyhow::bail!("operator name must not be empty");
    }
    issue(
        state,
        IssueRequest {
            display_name: name.to_string(),
            class: IdentityClass::Privileged,
            profile: None,
            custom_persona: false,
            assistant_name: String::new(),
            developer_name: String::new(),
        },
    )
}

fn issue(state: &AppState, req: IssueRequest) -> anyhow::Result<()> {
    if req.display_name.trim().is_empty() {
        anyhow::bail!("display name must not be empty");
    }
    let identity = new_identity(state, req);
    state.identities.insert(identity.clone())?;
    tracing::info!(identity_id = %identity.id, class = %identity.class, "identity issued");

    println!("Issued {} ({})", identity.display_name, identity.class);
    println!("id:         {}", identity.id);
    println!("access key: {}", identity.secret);
    println!("The key is shown only once.");
    Ok(())
}

fn describe(state: &AppState, identity: &Identity) -> String {
    let ttl = if identity.is_privileged() {
        "never expires".to_string()
    } else {
        match state.access.remaining_ttl(identity) {
            Some(left) if left > chrono::Duration::zero() => {
                format!("expires in {}", format_remaining(left))
            }
            _ => "expired".to_string(),
        }
    };
    let persona = if identity.persona_overrides.is_some() {
        "  [custom persona]"
    } else {
        ""
    };
    format!(
        "{}  {:<20} {:<10} {}{}",
        identity.id,
        identity.display_name,
        identity.class.as_str(),
        ttl,
        persona
    )
}
