//! Chat turn scenarios against a local echo backend and file-backed stores.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use cg_domain::chat::{Attachment, ChatLogEntry, ContentPart, ConversationTurn, Role};
use cg_domain::config::Config;
use cg_domain::error::{Error, Result};
use cg_domain::identity::{Identity, IdentityClass};
use cg_gateway::bootstrap::build_app_state_with;
use cg_gateway::runtime::{ChatTurnService, TurnOutcome, SERVICE_UNAVAILABLE_NOTICE};
use cg_gateway::state::AppState;
use cg_providers::{
    Credential, Dispatcher, GenerationBackend, GenerationRequest, GenerationResponse,
};
use cg_sessions::ChatLogStore;

// ── Echo backend ────────────────────────────────────────────────────

/// Replies `echo: <last user text>`. Keys starting with `bad` are
/// rate-limited.
#[derive(Default)]
struct EchoBackend {
    requests: Mutex<Vec<(String, GenerationRequest)>>,
}

impl EchoBackend {
    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last(&self) -> (String, GenerationRequest) {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl GenerationBackend for EchoBackend {
    async fn generate(
        &self,
        credential: &Credential,
        req: &GenerationRequest,
    ) -> Result<GenerationResponse> {
        let key = credential.expose().to_string();
        self.requests.lock().unwrap().push((key.clone(), req.clone()));
        // Let concurrent turns overlap.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        if key.starts_with("bad") {
            return Err(Error::Upstream {
                provider: "echo".into(),
                status: 429,
                message: "quota".into(),
            });
        }
        let last = req
            .messages
            .last()
            .map(|m| m.joined_text())
            .unwrap_or_default();
        Ok(GenerationResponse {
            text: format!("echo: {last}"),
            model: "echo".into(),
            finish_reason: Some("stop".into()),
        })
    }

    fn provider_id(&self) -> &str {
        "echo"
    }

    fn default_model(&self) -> &str {
        "echo-model"
    }
}

fn setup(pool: &[&str]) -> (tempfile::TempDir, AppState, Arc<EchoBackend>, Identity) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.state_path = dir.path().to_path_buf();
    config.upstream.credential_envs = Vec::new();

    let backend = Arc::new(EchoBackend::default());
    let state = build_app_state_with(
        Arc::new(config),
        dir.path().join("config.toml"),
        Arc::new(tokio::sync::Notify::new()),
        backend.clone(),
    )
    .unwrap();
    for key in pool {
        state.settings.add_credential(key).unwrap();
    }

    let alice = Identity::new("alice", "ck_alice000000", IdentityClass::Standard, Utc::now());
    state.identities.insert(alice.clone()).unwrap();
    (dir, state, backend, alice)
}

/// Chat log whose writes always fail.
struct BrokenLog;

#[async_trait::async_trait]
impl ChatLogStore for BrokenLog {
    async fn append(&self, _identity_id: &str, _entries: &[ChatLogEntry]) -> Result<()> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    async fn history(&self, _identity_id: &str) -> Result<Vec<ChatLogEntry>> {
        Ok(Vec::new())
    }

    async fn purge(&self, _identity_id: &str) -> Result<()> {
        Ok(())
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn reply_is_persisted_after_the_user_line() {
    let (_dir, state, backend, alice) = setup(&["k1"]);

    let out = state
        .turns
        .submit_turn(&alice, &[], "  hello  ", &[])
        .await
        .unwrap();
    assert_eq!(
        out,
        TurnOutcome::Reply {
            text: "echo: hello".into(),
            credential_index: 0,
            attempts: 1,
        }
    );

    let (_, req) = backend.last();
    let instruction = req.system_instruction.unwrap();
    assert!(instruction.starts_with("User: alice."));

    let history = state.turns.history(&alice.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "hello");
    assert_eq!(history[1].content, "echo: hello");
}

#[tokio::test]
async fn rotates_past_a_rate_limited_key() {
    let (_dir, state, backend, alice) = setup(&["bad-1", "k2"]);

    let out = state
        .turns
        .submit_turn(&alice, &[], "hi", &[])
        .await
        .unwrap();
    match out {
        TurnOutcome::Reply {
            credential_index,
            attempts,
            ..
        } => {
            assert_eq!(credential_index, 1);
            assert_eq!(attempts, 2);
        }
        other => panic!("expected reply, got {other:?}"),
    }
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn empty_turn_never_reaches_upstream() {
    let (_dir, state, backend, alice) = setup(&["k1"]);

    let err = state
        .turns
        .submit_turn(&alice, &[], "   ", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyTurn));
    assert_eq!(backend.calls(), 0);
    assert!(state.turns.history(&alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn exhausted_pool_yields_notice_and_persists_nothing() {
    let (_dir, state, backend, alice) = setup(&["bad-1", "bad-2"]);

    let out = state
        .turns
        .submit_turn(&alice, &[], "hi", &[])
        .await
        .unwrap();
    assert_eq!(
        out,
        TurnOutcome::Unavailable {
            notice: SERVICE_UNAVAILABLE_NOTICE.into()
        }
    );
    assert!(out.to_turn().is_error);
    assert_eq!(backend.calls(), 2);
    assert!(state.turns.history(&alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_pool_is_unavailable_without_calls() {
    let (_dir, state, backend, alice) = setup(&[]);

    let out = state
        .turns
        .submit_turn(&alice, &[], "hi", &[])
        .await
        .unwrap();
    assert!(!out.is_reply());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn error_placeholders_are_not_replayed() {
    let (_dir, state, backend, alice) = setup(&["k1"]);
    let prior = vec![
        ConversationTurn::user("first"),
        ConversationTurn::error_placeholder(SERVICE_UNAVAILABLE_NOTICE),
    ];

    state
        .turns
        .submit_turn(&alice, &prior, "second", &[])
        .await
        .unwrap();

    let (_, req) = backend.last();
    assert_eq!(req.messages.len(), 2);
    assert_eq!(req.messages[0].joined_text(), "first");
    assert_eq!(req.messages[1].joined_text(), "second");
}

#[tokio::test]
async fn attachment_only_turn_is_sent_inline() {
    let (_dir, state, backend, alice) = setup(&["k1"]);
    let image = Attachment::new("image/png", vec![0x89, 0x50, 0x4e, 0x47]);

    let out = state
        .turns
        .submit_turn(&alice, &[], "", &[image])
        .await
        .unwrap();
    assert!(out.is_reply());

    let (_, req) = backend.last();
    let parts = &req.messages[0].parts;
    assert!(parts.iter().any(|p| matches!(
        p,
        ContentPart::InlineData { mime_type, data } if mime_type == "image/png" && data == "iVBORw=="
    )));
}

#[tokio::test]
async fn identity_override_pool_replaces_shared_pool() {
    let (_dir, state, backend, mut alice) = setup(&["shared"]);
    let mut overrides = state.settings.snapshot().derive_overrides("Nova", "Ops");
    overrides.credentials = vec!["own-key".into()];
    alice = state
        .identities
        .update_overrides(&alice.id, Some(overrides))
        .unwrap();

    state
        .turns
        .submit_turn(&alice, &[], "hi", &[])
        .await
        .unwrap();

    let (key, req) = backend.last();
    assert_eq!(key, "own-key");
    assert!(req.system_instruction.unwrap().contains("Nova"));
}

#[tokio::test]
async fn concurrent_turns_each_persist_one_exchange() {
    let (_dir, state, _backend, alice) = setup(&["k1"]);

    let (a, b) = tokio::join!(
        state.turns.submit_turn(&alice, &[], "one", &[]),
        state.turns.submit_turn(&alice, &[], "two", &[]),
    );
    assert!(a.unwrap().is_reply());
    assert!(b.unwrap().is_reply());

    let history = state.turns.history(&alice.id).await.unwrap();
    assert_eq!(history.len(), 4);
    for word in ["one", "two"] {
        let user = history
            .iter()
            .position(|t| t.role == Role::User && t.content == word)
            .unwrap();
        let reply = history
            .iter()
            .position(|t| t.role == Role::Assistant && t.content == format!("echo: {word}"))
            .unwrap();
        assert!(user < reply, "user line for {word} must precede its reply");
    }
}

#[tokio::test]
async fn history_after_attachment_only_turn_replays_cleanly() {
    let (_dir, state, backend, alice) = setup(&["k1"]);
    let image = Attachment::new("image/png", vec![0x89, 0x50, 0x4e, 0x47]);

    let first = state
        .turns
        .submit_turn(&alice, &[], "", &[image])
        .await
        .unwrap();
    assert!(first.is_reply());

    let history = state.turns.history(&alice.id).await.unwrap();
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "[attached: image/png]");

    let next = state
        .turns
        .submit_turn(&alice, &history, "next", &[])
        .await
        .unwrap();
    assert_eq!(next.display_text(), "echo: next");

    let (_, req) = backend.last();
    assert_eq!(req.messages.len(), 3);
    assert!(req.messages.iter().all(|m| !m.parts.is_empty()));
    assert_eq!(req.messages[0].joined_text(), "[attached: image/png]");
}

#[tokio::test]
async fn failed_chat_log_write_keeps_the_reply() {
    let (_dir, state, backend, alice) = setup(&["k1"]);
    let dispatcher = Arc::new(Dispatcher::from_config(backend, &state.config.upstream));
    let turns = ChatTurnService::new(dispatcher, state.settings.clone(), Arc::new(BrokenLog));

    let out = turns.submit_turn(&alice, &[], "hello", &[]).await.unwrap();
    assert_eq!(
        out,
        TurnOutcome::Reply {
            text: "echo: hello".into(),
            credential_index: 0,
            attempts: 1,
        }
    );
}
