//! Credential failover dispatch.
//!
//! [`Dispatcher::dispatch`] turns one generation request into a bounded
//! sequence of attempts over an immutable pool snapshot: one upstream call
//! per credential, stopping at the first usable answer or the first fatal
//! failure. The dispatcher never mutates the pool and keeps no state
//! between calls apart from the round-robin cursor.

use cg_domain::config::{SelectionPolicy, UpstreamConfig};
use cg_domain::error::{Error, Result};
use cg_domain::trace::TraceEvent;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::classifier::{classify, FailureClass};
use crate::pool::Credential;
use crate::traits::{GenerationBackend, GenerationRequest, GenerationResponse};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub enum DispatchOutcome {
    Success {
        text: String,
        /// Index into the pool snapshot of the credential that answered.
        credential_index: usize,
        /// Upstream calls made, including the successful one.
        attempts: usize,
    },
    Exhausted(Exhaustion),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success { .. })
    }

    /// Short label for logs and trace events.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Success { .. } => "success",
            DispatchOutcome::Exhausted(e) => e.kind(),
        }
    }
}

/// Why a dispatch produced no answer.
#[derive(Debug)]
pub enum Exhaustion {
    /// The pool was empty; no upstream call was made.
    NoCredentials,
    /// Every credential was tried once and each was rejected.
    AllRejected { attempts: usize, last_error: Error },
    /// A non-retryable failure ended the dispatch early.
    Fatal { credential_index: usize, error: Error },
}

impl Exhaustion {
    pub fn kind(&self) -> &'static str {
        match self {
            Exhaustion::NoCredentials => "no_credentials",
            Exhaustion::AllRejected { .. } => "all_rejected",
            Exhaustion::Fatal { .. } => "fatal",
        }
    }

    /// True for the pool-exhaustion cases, false for a fatal upstream error.
    pub fn is_pool_exhausted(&self) -> bool {
        !matches!(self, Exhaustion::Fatal { .. })
    }
}

impl std::fmt::Display for Exhaustion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exhaustion::NoCredentials => f.write_str("credential pool is empty"),
            Exhaustion::AllRejected {
                attempts,
                last_error,
            } => write!(f, "all {attempts} credentials rejected; last error: {last_error}"),
            Exhaustion::Fatal {
                credential_index,
                error,
            } => write!(f, "fatal upstream error on credential #{credential_index}: {error}"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Dispatcher {
    backend: Arc<dyn GenerationBackend>,
    attempt_timeout: Duration,
    policy: SelectionPolicy,
    cursor: AtomicUsize,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        attempt_timeout: Duration,
        policy: SelectionPolicy,
    ) -> Self {
        Self {
            backend,
            attempt_timeout,
            policy,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn from_config(backend: Arc<dyn GenerationBackend>, cfg: &UpstreamConfig) -> Self {
        Self::new(
            backend,
            Duration::from_millis(cfg.attempt_timeout_ms),
            cfg.selection,
        )
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    /// Deliver `req` using the credentials in `pool`, in selection order.
    pub async fn dispatch(&self, req: &GenerationRequest, pool: &[Credential]) -> DispatchOutcome {
        let len = pool.len();
        if len == 0 {
            tracing::warn!(provider = %self.backend.provider_id(), "dispatch with empty credential pool");
            return self.finish(DispatchOutcome::Exhausted(Exhaustion::NoCredentials), 0, 0);
        }

        let start = self.start_index(len);
        let model = req
            .model
            .as_deref()
            .unwrap_or_else(|| self.backend.default_model())
            .to_string();
        let mut last_error: Option<Error> = None;

        for offset in 0..len {
            let idx = (start + offset) % len;
            let credential = &pool[idx];
            let attempts = offset + 1;

            let started = Instant::now();
            let result = self
                .try_generate(credential, req)
                .await
                .and_then(|resp| self.require_text(resp));
            let duration_ms = started.elapsed().as_millis() as u64;

            TraceEvent::UpstreamAttempt {
                provider: self.backend.provider_id().to_string(),
                model: model.clone(),
                credential_index: idx,
                credential_fingerprint: credential.fingerprint(),
                outcome: match &result {
                    Ok(_) => "ok".to_string(),
                    Err(e) => error_kind(e),
                },
                duration_ms,
            }
            .emit();

            match result {
                Ok(resp) => {
                    return self.finish(
                        DispatchOutcome::Success {
                            text: resp.text,
                            credential_index: idx,
                            attempts,
                        },
                        attempts,
                        len,
                    );
                }
                Err(e) => match classify(&e) {
                    FailureClass::Retryable => {
                        tracing::warn!(
                            credential_index = idx,
                            credential = %credential.fingerprint(),
                            error = %e,
                            "credential rejected, rotating"
                        );
                        if offset + 1 < len {
                            TraceEvent::CredentialRotated {
                                from_index: idx,
                                to_index: (idx + 1) % len,
                                reason: error_kind(&e),
                            }
                            .emit();
                        }
                        last_error = Some(e);
                    }
                    FailureClass::Fatal => {
                        return self.finish(
                            DispatchOutcome::Exhausted(Exhaustion::Fatal {
                                credential_index: idx,
                                error: e,
                            }),
                            attempts,
                            len,
                        );
                    }
                },
            }
        }

        let last_error = last_error.unwrap_or_else(|| Error::Other("no attempt recorded".into()));
        self.finish(
            DispatchOutcome::Exhausted(Exhaustion::AllRejected {
                attempts: len,
                last_error,
            }),
            len,
            len,
        )
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn start_index(&self, len: usize) -> usize {
        match self.policy {
            SelectionPolicy::Ordered => 0,
            SelectionPolicy::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % len,
        }
    }

    /// One upstream call bounded by the per-attempt timeout.
    async fn try_generate(
        &self,
        credential: &Credential,
        req: &GenerationRequest,
    ) -> Result<GenerationResponse> {
        match tokio::time::timeout(self.attempt_timeout, self.backend.generate(credential, req)).await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "provider '{}' timed out after {}ms",
                self.backend.provider_id(),
                self.attempt_timeout.as_millis()
            ))),
        }
    }

    fn require_text(&self, resp: GenerationResponse) -> Result<GenerationResponse> {
        if resp.text.trim().is_empty() {
            Err(Error::EmptyOutput {
                provider: self.backend.provider_id().to_string(),
            })
        } else {
            Ok(resp)
        }
    }

    fn finish(&self, outcome: DispatchOutcome, attempts: usize, pool_size: usize) -> DispatchOutcome {
        TraceEvent::DispatchCompleted {
            outcome: outcome.label().to_string(),
            attempts,
            pool_size,
        }
        .emit();
        outcome
    }
}

fn error_kind(e: &Error) -> String {
    match e {
        Error::Upstream { status, .. } => format!("http_{status}"),
        Error::EmptyOutput { .. } => "empty_output".into(),
        Error::Timeout(_) => "timeout".into(),
        Error::Http(_) => "network".into(),
        Error::Provider { .. } => "undecodable".into(),
        _ => "other".into(),
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("provider", &self.backend.provider_id())
            .field("attempt_timeout", &self.attempt_timeout)
            .field("policy", &self.policy)
            .finish()
    }
}
