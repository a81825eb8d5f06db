use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Speaker of a conversation turn.
///
/// The assistant side is serialized as `"model"`, which is the role name
/// the upstream generation API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "model")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }
}

/// An opaque binary attachment (typically an image) with its content type.
///
/// On the wire `data` is standard base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub mime_type: String,
    #[serde(serialize_with = "ser_b64", deserialize_with = "de_b64")]
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Base64 form of the payload, as sent upstream.
    pub fn encoded(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

fn ser_b64<S: Serializer>(data: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
}

fn de_b64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<u8>, D::Error> {
    let raw = String::deserialize(d)?;
    base64::engine::general_purpose::STANDARD
        .decode(raw.as_bytes())
        .map_err(serde::de::Error::custom)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One message of a conversation as seen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Set on locally-generated failure notices. Such turns are shown to
    /// the user but never replayed upstream.
    #[serde(default)]
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments: Vec::new(),
            is_error: false,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachments: Vec::new(),
            is_error: false,
            created_at: Utc::now(),
        }
    }

    /// An assistant-side failure notice.
    pub fn error_placeholder(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(content)
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Upstream payload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One part of an upstream message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    InlineData { mime_type: String, data: String },
}

/// A message in the assembled upstream payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl Message {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ContentPart::Text { text: text.into() }],
        }
    }

    /// Concatenated text of all text parts.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::InlineData { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat log records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A persisted chat-log line, keyed by identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub id: String,
    pub identity_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatLogEntry {
    pub fn new(identity_id: &str, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            identity_id: identity_id.to_owned(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Rehydrate as a replayable conversation turn.
    pub fn to_turn(&self) -> ConversationTurn {
        ConversationTurn {
            role: self.role,
            content: self.content.clone(),
            attachments: Vec::new(),
            is_error: false,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_role_serializes_as_model() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, r#""model""#);
    }

    #[test]
    fn attachment_data_is_base64_on_the_wire() {
        let att = Attachment::new("image/png", vec![0x89, 0x50, 0x4e, 0x47]);
        let json = serde_json::to_value(&att).unwrap();
        assert_eq!(json["data"], "iVBORw==");
        let back: Attachment = serde_json::from_value(json).unwrap();
        assert_eq!(back.data, vec![0x89, 0x50, 0x4e, 0x47]);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let err = serde_json::from_str::<Attachment>(r#"{"mime_type":"image/png","data":"%%%"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn error_placeholder_is_flagged_assistant_turn() {
        let t = ConversationTurn::error_placeholder("Error: boom");
        assert_eq!(t.role, Role::Assistant);
        assert!(t.is_error);
    }

    #[test]
    fn joined_text_skips_inline_data() {
        let msg = Message {
            role: Role::User,
            parts: vec![
                ContentPart::Text { text: "a".into() },
                ContentPart::InlineData {
                    mime_type: "image/png".into(),
                    data: "AAAA".into(),
                },
                ContentPart::Text { text: "b".into() },
            ],
        };
        assert_eq!(msg.joined_text(), "ab");
    }
}
