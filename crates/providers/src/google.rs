//! Google Gemini adapter.
//!
//! Implements the Gemini `generateContent` API. Auth is via an API key
//! passed as a query parameter (`key={api_key}`); the key is supplied per
//! call so the dispatcher can rotate through the pool.

use cg_domain::chat::{ContentPart, Message};
use cg_domain::config::UpstreamConfig;
use cg_domain::error::{Error, Result};
use serde_json::Value;

use crate::pool::Credential;
use crate::traits::{GenerationBackend, GenerationRequest, GenerationResponse};
use crate::util::{from_reqwest, redact_url_key, truncate_body};

const PROVIDER_ID: &str = "gemini";
const MAX_ERROR_BODY_CHARS: usize = 512;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GeminiBackend {
    base_url: String,
    default_model: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    /// Build the adapter from the `[upstream]` config section.
    ///
    /// The HTTP client carries no timeout of its own; the dispatcher
    /// bounds each attempt.
    pub fn from_config(cfg: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(from_reqwest)?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            default_model: cfg.model.clone(),
            client,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn generate_url(&self, model: &str, api_key: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, api_key
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn build_body(req: &GenerationRequest) -> Value {
    let contents: Vec<Value> = req.messages.iter().map(message_to_gemini).collect();

    let mut body = serde_json::json!({
        "contents": contents,
    });

    if let Some(si) = req.system_instruction.as_deref().filter(|s| !s.is_empty()) {
        body["systemInstruction"] = serde_json::json!({
            "parts": [{"text": si}]
        });
    }

    body
}

fn message_to_gemini(msg: &Message) -> Value {
    let parts: Vec<Value> = msg
        .parts
        .iter()
        .map(|p| match p {
            ContentPart::Text { text } => serde_json::json!({"text": text}),
            ContentPart::InlineData { mime_type, data } => serde_json::json!({
                "inlineData": {
                    "mimeType": mime_type,
                    "data": data,
                }
            }),
        })
        .collect();
    serde_json::json!({
        "role": msg.role.as_str(),
        "parts": parts,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Extract the first candidate's text.
///
/// A well-formed body without any text (no candidates, a blocked prompt,
/// parts with no text) yields an empty string rather than an error.
fn parse_gemini_response(body: &Value, model: &str) -> GenerationResponse {
    let candidate = body
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());

    let mut text = String::new();
    if let Some(parts) = candidate
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    {
        for part in parts {
            if let Some(t) = part.get("text").and_then(|v| v.as_str()) {
                text.push_str(t);
            }
        }
    }

    let finish_reason = candidate
        .and_then(|c| c.get("finishReason"))
        .and_then(|v| v.as_str())
        .map(|s| match s {
            "STOP" => "stop".to_string(),
            "MAX_TOKENS" => "length".to_string(),
            other => other.to_lowercase(),
        })
        .or_else(|| {
            body.get("promptFeedback")
                .and_then(|f| f.get("blockReason"))
                .and_then(|v| v.as_str())
                .map(|r| format!("blocked:{}", r.to_lowercase()))
        });

    GenerationResponse {
        text,
        model: body
            .get("modelVersion")
            .and_then(|v| v.as_str())
            .unwrap_or(model)
            .to_string(),
        finish_reason,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(
        &self,
        credential: &Credential,
        req: &GenerationRequest,
    ) -> Result<GenerationResponse> {
        let model = req.model.as_deref().unwrap_or(&self.default_model);
        let url = self.generate_url(model, credential.expose());
        let body = build_body(req);

        tracing::debug!(
            provider = PROVIDER_ID,
            url = %redact_url_key(&url),
            messages = req.messages.len(),
            "gemini generate request"
        );

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Upstream {
                provider: PROVIDER_ID.into(),
                status: status.as_u16(),
                message: truncate_body(&resp_text, MAX_ERROR_BODY_CHARS),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text).map_err(|e| Error::Provider {
            provider: PROVIDER_ID.into(),
            message: format!("undecodable response body: {e}"),
        })?;
        Ok(parse_gemini_response(&resp_json, model))
    }

    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use cg_domain::chat::Role;

    #[test]
    fn body_maps_roles_parts_and_system_instruction() {
        let req = GenerationRequest {
            messages: vec![
                Message::text(Role::User, "hi"),
                Message::text(Role::Assistant, "hello"),
                Message {
                    role: Role::User,
                    parts: vec![
                        ContentPart::Text {
                            text: "what is this".into(),
                        },
                        ContentPart::InlineData {
                            mime_type: "image/png".into(),
                            data: "AAAA".into(),
                        },
                    ],
                },
            ],
            system_instruction: Some("User: bob. Be brief.".into()),
            model: None,
        };
        let body = build_body(&req);
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "User: bob. Be brief."
        );
    }

    #[test]
    fn body_omits_empty_system_instruction() {
        let req = GenerationRequest {
            messages: vec![Message::text(Role::User, "hi")],
            system_instruction: Some(String::new()),
            model: None,
        };
        assert!(build_body(&req).get("systemInstruction").is_none());
    }

    #[test]
    fn parse_concatenates_text_parts() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hel"}, {"text": "lo"}]},
                "finishReason": "STOP"
            }]
        });
        let r = parse_gemini_response(&body, "gemini-2.5-flash");
        assert_eq!(r.text, "Hello");
        assert_eq!(r.finish_reason.as_deref(), Some("stop"));
        assert_eq!(r.model, "gemini-2.5-flash");
    }

    #[test]
    fn parse_blocked_prompt_yields_empty_text() {
        let body = serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        });
        let r = parse_gemini_response(&body, "m");
        assert!(r.text.is_empty());
        assert_eq!(r.finish_reason.as_deref(), Some("blocked:safety"));
    }

    #[test]
    fn url_carries_model_and_key() {
        let backend = GeminiBackend::from_config(&UpstreamConfig {
            base_url: "https://example.test/".into(),
            ..UpstreamConfig::default()
        })
        .unwrap();
        assert_eq!(
            backend.generate_url("gemini-2.5-flash", "k"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent?key=k"
        );
    }
}
