use cg_domain::chat::Message;
use cg_domain::error::Result;

use crate::pool::Credential;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One logical generation request, independent of the credential used.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Conversation in chronological order, ending with the new user turn.
    pub messages: Vec<Message>,
    /// Sent as the upstream system instruction when present.
    pub system_instruction: Option<String>,
    /// Model override. When `None`, the backend uses its configured model.
    pub model: Option<String>,
}

/// Successful upstream response.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Concatenated text of the first candidate. May be empty; the
    /// dispatcher decides what that means.
    pub text: String,
    /// The model that produced the response.
    pub model: String,
    pub finish_reason: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A hosted generation API reachable with a per-call credential.
///
/// Implementations make exactly one upstream call per invocation and map
/// non-success statuses to [`cg_domain::error::Error::Upstream`].
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        credential: &Credential,
        req: &GenerationRequest,
    ) -> Result<GenerationResponse>;

    /// Identifier used in logs and errors.
    fn provider_id(&self) -> &str;

    /// The model used when a request carries no override.
    fn default_model(&self) -> &str;
}
