//! Chat turn execution.
//!
//! [`ChatTurnService::submit_turn`] runs one exchange end to end: assemble
//! the payload, resolve persona and credentials for the identity, dispatch
//! through the key-rotation loop, persist the exchange, and map the outcome
//! to what the user sees.

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use cg_domain::chat::{Attachment, ChatLogEntry, ConversationTurn, Role};
use cg_domain::error::Result;
use cg_domain::identity::Identity;
use cg_providers::{DispatchOutcome, Dispatcher, Exhaustion, GenerationRequest};
use cg_sessions::ChatLogStore;

use super::assembler::assemble;
use super::settings::SettingsStore;

/// The only failure text a user ever sees for a failed dispatch.
pub const SERVICE_UNAVAILABLE_NOTICE: &str =
    "The assistant is unavailable right now. Please contact the operator.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The assistant answered.
    Reply {
        text: String,
        credential_index: usize,
        attempts: usize,
    },
    /// No credential produced an answer. `notice` is
    /// [`SERVICE_UNAVAILABLE_NOTICE`].
    Unavailable { notice: String },
}

impl TurnOutcome {
    pub fn is_reply(&self) -> bool {
        matches!(self, TurnOutcome::Reply { .. })
    }

    pub fn display_text(&self) -> &str {
        match self {
            TurnOutcome::Reply { text, .. } => text,
            TurnOutcome::Unavailable { notice } => notice,
        }
    }

    /// The turn to append to the visible conversation. Failure notices are
    /// flagged so they are never replayed upstream.
    pub fn to_turn(&self) -> ConversationTurn {
        match self {
            TurnOutcome::Reply { text, .. } => ConversationTurn::assistant(text.clone()),
            TurnOutcome::Unavailable { notice } => ConversationTurn::error_placeholder(notice.clone()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ChatTurnService {
    dispatcher: Arc<Dispatcher>,
    settings: Arc<SettingsStore>,
    chat_log: Arc<dyn ChatLogStore>,
}

impl ChatTurnService {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        settings: Arc<SettingsStore>,
        chat_log: Arc<dyn ChatLogStore>,
    ) -> Self {
        Self {
            dispatcher,
            settings,
            chat_log,
        }
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn chat_log(&self) -> &Arc<dyn ChatLogStore> {
        &self.chat_log
    }

    /// Persisted conversation of `identity_id`, oldest first.
    pub async fn history(&self, identity_id: &str) -> Result<Vec<ConversationTurn>> {
        let entries = self.chat_log.history(identity_id).await?;
        Ok(entries.iter().map(ChatLogEntry::to_turn).collect())
    }

    /// Run one exchange for `identity`.
    ///
    /// `prior` is the conversation visible to the caller. Blank text with
    /// no attachments fails with `Error::EmptyTurn` before any upstream
    /// call. Upstream failures never surface as `Err`; they become
    /// [`TurnOutcome::Unavailable`].
    pub async fn submit_turn(
        &self,
        identity: &Identity,
        prior: &[ConversationTurn],
        text: &str,
        attachments: &[Attachment],
    ) -> Result<TurnOutcome> {
        let messages = assemble(prior, text, attachments)?;
        // Stamped now so the user line sorts before its reply.
        let user_entry =
            ChatLogEntry::new(&identity.id, Role::User, user_log_text(text, attachments));

        let span = tracing::info_span!(
            "turn",
            identity_id = %identity.id,
            messages = messages.len(),
            attachments = attachments.len(),
        );

        async move {
            let resolved = self.settings.resolve_for(identity);
            let pool = self.settings.credentials_for(&resolved);
            let req = GenerationRequest {
                messages,
                system_instruction: Some(resolved.system_instruction(&identity.display_name)),
                model: None,
            };

            tracing::debug!(
                pool_size = pool.len(),
                pool_overridden = resolved.credentials_overridden,
                "dispatching turn"
            );

            match self.dispatcher.dispatch(&req, &pool).await {
                DispatchOutcome::Success {
                    text,
                    credential_index,
                    attempts,
                } => {
                    let reply = ChatLogEntry::new(&identity.id, Role::Assistant, text.clone());
                    self.persist(&identity.id, user_entry, reply).await;
                    Ok(TurnOutcome::Reply {
                        text,
                        credential_index,
                        attempts,
                    })
                }
                DispatchOutcome::Exhausted(exhaustion) => {
                    log_exhaustion(&exhaustion);
                    Ok(TurnOutcome::Unavailable {
                        notice: SERVICE_UNAVAILABLE_NOTICE.to_string(),
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// One ordered append of the exchange. Failures are logged only.
    async fn persist(&self, identity_id: &str, user: ChatLogEntry, reply: ChatLogEntry) {
        if let Err(e) = self.chat_log.append(identity_id, &[user, reply]).await {
            tracing::warn!(identity_id, error = %e, "failed to persist chat exchange");
        }
    }
}

impl std::fmt::Debug for ChatTurnService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatTurnService")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Text recorded for the user line. Attachment bytes are not logged, so an
/// attachment-only turn is recorded by its media types and still replays
/// as a non-empty message.
fn user_log_text(text: &str, attachments: &[Attachment]) -> String {
    let text = text.trim();
    if !text.is_empty() || attachments.is_empty() {
        return text.to_owned();
    }
    let kinds: Vec<&str> = attachments.iter().map(|a| a.mime_type.as_str()).collect();
    format!("[attached: {}]", kinds.join(", "))
}

fn log_exhaustion(exhaustion: &Exhaustion) {
    match exhaustion {
        Exhaustion::Fatal {
            credential_index,
            error,
        } => {
            tracing::error!(
                credential_index,
                error = %error,
                "upstream failed fatally, turn abandoned"
            );
        }
        other => {
            tracing::warn!(kind = other.kind(), detail = %other, "credential pool exhausted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_turn_is_an_error_placeholder() {
        let out = TurnOutcome::Unavailable {
            notice: SERVICE_UNAVAILABLE_NOTICE.into(),
        };
        let turn = out.to_turn();
        assert!(turn.is_error);
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(out.display_text(), SERVICE_UNAVAILABLE_NOTICE);
    }

    #[test]
    fn attachment_only_turn_is_logged_by_media_type() {
        let png = Attachment::new("image/png", vec![1]);
        let pdf = Attachment::new("application/pdf", vec![2]);
        assert_eq!(
            user_log_text("  ", &[png.clone(), pdf]),
            "[attached: image/png, application/pdf]"
        );
        assert_eq!(user_log_text(" look ", &[png]), "look");
    }

    #[test]
    fn reply_turn_is_replayable() {
        let out = TurnOutcome::Reply {
            text: "hi".into(),
            credential_index: 2,
            attempts: 3,
        };
        assert!(out.is_reply());
        assert!(!out.to_turn().is_error);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["type"], "reply");
        assert_eq!(json["attempts"], 3);
    }
}
