//! Chat endpoints.
//!
//! - `POST /v1/chat`: run one turn for the calling identity
//! - `GET  /v1/chat/history`: persisted conversation plus stats

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use cg_domain::chat::{Attachment, ConversationTurn, Role};

use super::error_response;
use super::guard::AuthedIdentity;
use crate::runtime::TurnOutcome;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    /// Inline attachments, base64 `data`.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// The conversation as the client sees it. When absent, the persisted
    /// history is replayed.
    #[serde(default)]
    pub history: Option<Vec<ConversationTurn>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub outcome: TurnOutcome,
    /// The turn to show, flagged with `is_error` for failure notices.
    pub turn: ConversationTurn,
}

pub async fn chat(
    AuthedIdentity(identity): AuthedIdentity,
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Response {
    let prior = match body.history {
        Some(turns) => turns,
        None => match state.turns.history(&identity.id).await {
            Ok(turns) => turns,
            Err(e) => {
                // A lost history should not block the conversation.
                tracing::warn!(identity_id = %identity.id, error = %e, "history unavailable, sending turn without it");
                Vec::new()
            }
        },
    };

    match state
        .turns
        .submit_turn(&identity, &prior, &body.message, &body.attachments)
        .await
    {
        Ok(outcome) => {
            let turn = outcome.to_turn();
            Json(ChatResponse { outcome, turn }).into_response()
        }
        Err(e) => error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/chat/history
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub total_turns: usize,
    pub user_turns: usize,
    pub assistant_turns: usize,
}

impl HistoryStats {
    pub fn of(turns: &[ConversationTurn]) -> Self {
        let user_turns = turns.iter().filter(|t| t.role == Role::User).count();
        Self {
            total_turns: turns.len(),
            user_turns,
            assistant_turns: turns.len() - user_turns,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub turns: Vec<ConversationTurn>,
    pub stats: HistoryStats,
    /// Display-only opener, present when there is no history yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
}

pub async fn history(
    AuthedIdentity(identity): AuthedIdentity,
    State(state): State<AppState>,
) -> Response {
    let turns = match state.turns.history(&identity.id).await {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };
    let greeting = turns.is_empty().then(|| {
        state
            .settings
            .resolve_for(&identity)
            .greeting(&identity.display_name)
    });
    Json(HistoryResponse {
        stats: HistoryStats::of(&turns),
        turns,
        greeting,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_roles() {
        let turns = vec![
            ConversationTurn::user("a"),
            ConversationTurn::assistant("b"),
            ConversationTurn::user("c"),
        ];
        assert_eq!(
            HistoryStats::of(&turns),
            HistoryStats {
                total_turns: 3,
                user_turns: 2,
                assistant_turns: 1,
            }
        );
    }

    #[test]
    fn request_defaults_allow_attachment_only_turns() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"attachments":[{"mime_type":"image/png","data":"iVBORw=="}]}"#,
        )
        .unwrap();
        assert!(req.message.is_empty());
        assert_eq!(req.attachments[0].data, vec![0x89, 0x50, 0x4e, 0x47]);
        assert!(req.history.is_none());
    }
}
