//! Dispatcher scenarios against a scripted backend.

use cg_domain::chat::{Message, Role};
use cg_domain::config::SelectionPolicy;
use cg_domain::error::{Error, Result};
use cg_providers::{
    Credential, DispatchOutcome, Dispatcher, Exhaustion, GenerationBackend, GenerationRequest,
    GenerationResponse,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Scripted backend ────────────────────────────────────────────────

#[derive(Clone)]
enum Script {
    Text(&'static str),
    Status(u16),
    Network,
    Hang,
}

struct ScriptedBackend {
    script: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(entries: &[(&str, Script)]) -> Arc<Self> {
        Arc::new(Self {
            script: entries
                .iter()
                .map(|(k, s)| (k.to_string(), s.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(
        &self,
        credential: &Credential,
        _req: &GenerationRequest,
    ) -> Result<GenerationResponse> {
        let key = credential.expose().to_string();
        self.calls.lock().unwrap().push(key.clone());
        match self.script.get(&key).cloned().unwrap_or(Script::Status(500)) {
            Script::Text(t) => Ok(GenerationResponse {
                text: t.to_string(),
                model: "scripted".into(),
                finish_reason: Some("stop".into()),
            }),
            Script::Status(status) => Err(Error::Upstream {
                provider: "scripted".into(),
                status,
                message: format!("scripted {status}"),
            }),
            Script::Network => Err(Error::Http("connection reset".into())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Err(Error::Other("unreachable".into()))
            }
        }
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }
}

fn pool(keys: &[&str]) -> Arc<[Credential]> {
    keys.iter().map(|k| Credential::new(*k)).collect()
}

fn request() -> GenerationRequest {
    GenerationRequest {
        messages: vec![Message::text(Role::User, "hello")],
        system_instruction: Some("User: test.".into()),
        model: None,
    }
}

fn dispatcher(backend: Arc<ScriptedBackend>) -> Dispatcher {
    Dispatcher::new(backend, Duration::from_millis(200), SelectionPolicy::Ordered)
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn rotates_past_rejected_keys_to_first_success() {
    let backend = ScriptedBackend::new(&[
        ("A", Script::Status(403)),
        ("B", Script::Status(429)),
        ("C", Script::Text("hi")),
    ]);
    let outcome = dispatcher(backend.clone())
        .dispatch(&request(), &pool(&["A", "B", "C"]))
        .await;

    match outcome {
        DispatchOutcome::Success {
            text,
            credential_index,
            attempts,
        } => {
            assert_eq!(text, "hi");
            assert_eq!(credential_index, 2);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(backend.calls(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn stops_at_first_success() {
    let backend = ScriptedBackend::new(&[
        ("A", Script::Status(400)),
        ("B", Script::Text("answer")),
        ("C", Script::Text("never")),
    ]);
    let outcome = dispatcher(backend.clone())
        .dispatch(&request(), &pool(&["A", "B", "C"]))
        .await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Success {
            credential_index: 1,
            attempts: 2,
            ..
        }
    ));
    assert_eq!(backend.calls(), vec!["A", "B"]);
}

#[tokio::test]
async fn all_rejected_tries_each_key_once_in_order() {
    let backend = ScriptedBackend::new(&[
        ("A", Script::Status(429)),
        ("B", Script::Status(403)),
        ("C", Script::Status(400)),
    ]);
    let outcome = dispatcher(backend.clone())
        .dispatch(&request(), &pool(&["A", "B", "C"]))
        .await;

    match outcome {
        DispatchOutcome::Exhausted(Exhaustion::AllRejected {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(last_error, Error::Upstream { status: 400, .. }));
        }
        other => panic!("expected AllRejected, got {other:?}"),
    }
    assert_eq!(backend.calls(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn server_error_is_fatal_and_stops_rotation() {
    let backend = ScriptedBackend::new(&[
        ("A", Script::Status(500)),
        ("B", Script::Text("never")),
    ]);
    let outcome = dispatcher(backend.clone())
        .dispatch(&request(), &pool(&["A", "B"]))
        .await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Exhausted(Exhaustion::Fatal {
            credential_index: 0,
            error: Error::Upstream { status: 500, .. }
        })
    ));
    assert_eq!(backend.calls(), vec!["A"]);
}

#[tokio::test]
async fn fatal_after_retryable_stops_at_that_key() {
    let backend = ScriptedBackend::new(&[
        ("A", Script::Status(429)),
        ("B", Script::Network),
        ("C", Script::Text("never")),
    ]);
    let outcome = dispatcher(backend.clone())
        .dispatch(&request(), &pool(&["A", "B", "C"]))
        .await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Exhausted(Exhaustion::Fatal {
            credential_index: 1,
            ..
        })
    ));
    assert_eq!(backend.calls(), vec!["A", "B"]);
}

#[tokio::test]
async fn empty_pool_makes_no_calls() {
    let backend = ScriptedBackend::new(&[]);
    let outcome = dispatcher(backend.clone()).dispatch(&request(), &pool(&[])).await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Exhausted(Exhaustion::NoCredentials)
    ));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn blank_answer_counts_as_rejection() {
    let backend = ScriptedBackend::new(&[
        ("A", Script::Text("   ")),
        ("B", Script::Text("real")),
    ]);
    let outcome = dispatcher(backend.clone())
        .dispatch(&request(), &pool(&["A", "B"]))
        .await;

    match outcome {
        DispatchOutcome::Success { text, attempts, .. } => {
            assert_eq!(text, "real");
            assert_eq!(attempts, 2);
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn blank_answers_everywhere_exhaust_the_pool() {
    let backend = ScriptedBackend::new(&[("A", Script::Text("")), ("B", Script::Text(""))]);
    let outcome = dispatcher(backend.clone())
        .dispatch(&request(), &pool(&["A", "B"]))
        .await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Exhausted(Exhaustion::AllRejected {
            attempts: 2,
            last_error: Error::EmptyOutput { .. }
        })
    ));
}

#[tokio::test]
async fn attempt_timeout_is_fatal() {
    let backend = ScriptedBackend::new(&[("A", Script::Hang), ("B", Script::Text("never"))]);
    let d = Dispatcher::new(
        backend.clone(),
        Duration::from_millis(20),
        SelectionPolicy::Ordered,
    );
    let outcome = d.dispatch(&request(), &pool(&["A", "B"])).await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Exhausted(Exhaustion::Fatal {
            credential_index: 0,
            error: Error::Timeout(_)
        })
    ));
    assert_eq!(backend.calls(), vec!["A"]);
}

#[tokio::test]
async fn round_robin_advances_start_but_tries_each_key_once() {
    let backend = ScriptedBackend::new(&[
        ("A", Script::Status(429)),
        ("B", Script::Status(429)),
        ("C", Script::Status(429)),
    ]);
    let d = Dispatcher::new(
        backend.clone(),
        Duration::from_millis(200),
        SelectionPolicy::RoundRobin,
    );
    let keys = pool(&["A", "B", "C"]);

    d.dispatch(&request(), &keys).await;
    d.dispatch(&request(), &keys).await;

    assert_eq!(backend.calls(), vec!["A", "B", "C", "B", "C", "A"]);
}

#[tokio::test]
async fn concurrent_dispatches_are_independent() {
    let backend = ScriptedBackend::new(&[("A", Script::Status(403)), ("B", Script::Text("ok"))]);
    let d = Arc::new(dispatcher(backend.clone()));
    let keys = pool(&["A", "B"]);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let d = d.clone();
        let keys = keys.clone();
        handles.push(tokio::spawn(async move {
            d.dispatch(&request(), &keys).await
        }));
    }
    for h in handles {
        let outcome = h.await.unwrap();
        assert!(outcome.is_success());
    }
    assert_eq!(backend.calls().len(), 16);
}
