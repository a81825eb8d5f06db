//! Upstream payload assembly.
//!
//! Turns the visible conversation plus the new user input into the ordered
//! message list sent to the generation backend. Pure: no I/O, no clock.

use cg_domain::chat::{Attachment, ContentPart, ConversationTurn, Message, Role};
use cg_domain::error::{Error, Result};

/// Build the payload for one turn.
///
/// Prior turns keep their order; failure notices (`is_error`) and turns
/// with neither text nor attachments are dropped.
/// The new user message carries a text part when `text` is non-blank,
/// followed by one inline-data part per attachment. Blank text with no
/// attachments is rejected with [`Error::EmptyTurn`].
pub fn assemble(
    prior: &[ConversationTurn],
    text: &str,
    attachments: &[Attachment],
) -> Result<Vec<Message>> {
    let text = text.trim();
    if text.is_empty() && attachments.is_empty() {
        return Err(Error::EmptyTurn);
    }

    let mut messages: Vec<Message> = prior
        .iter()
        .filter(|t| !t.is_error)
        .map(turn_to_message)
        .filter(|m| !m.parts.is_empty())
        .collect();

    let mut parts = Vec::with_capacity(attachments.len() + 1);
    if !text.is_empty() {
        parts.push(ContentPart::Text {
            text: text.to_owned(),
        });
    }
    parts.extend(attachments.iter().map(inline_part));

    messages.push(Message {
        role: Role::User,
        parts,
    });
    Ok(messages)
}

fn turn_to_message(turn: &ConversationTurn) -> Message {
    let mut parts = Vec::with_capacity(turn.attachments.len() + 1);
    if !turn.content.is_empty() {
        parts.push(ContentPart::Text {
            text: turn.content.clone(),
        });
    }
    parts.extend(turn.attachments.iter().map(inline_part));
    Message {
        role: turn.role,
        parts,
    }
}

fn inline_part(a: &Attachment) -> ContentPart {
    ContentPart::InlineData {
        mime_type: a.mime_type.clone(),
        data: a.encoded(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> Attachment {
        Attachment::new("image/png", vec![0x89, 0x50, 0x4e, 0x47])
    }

    #[test]
    fn empty_text_without_attachments_is_rejected() {
        assert!(matches!(assemble(&[], "", &[]), Err(Error::EmptyTurn)));
        assert!(matches!(assemble(&[], "  \n\t", &[]), Err(Error::EmptyTurn)));
    }

    #[test]
    fn attachment_alone_is_accepted() {
        let msgs = assemble(&[], "", &[png()]).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[0].parts.len(), 1);
        assert!(matches!(
            &msgs[0].parts[0],
            ContentPart::InlineData { mime_type, data } if mime_type == "image/png" && data == "iVBORw=="
        ));
    }

    #[test]
    fn text_precedes_attachments() {
        let msgs = assemble(&[], " describe this ", &[png(), png()]).unwrap();
        let parts = &msgs[0].parts;
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0],
            ContentPart::Text {
                text: "describe this".into()
            }
        );
        assert!(matches!(parts[1], ContentPart::InlineData { .. }));
        assert!(matches!(parts[2], ContentPart::InlineData { .. }));
    }

    #[test]
    fn error_placeholders_are_never_replayed() {
        let prior = vec![
            ConversationTurn::user("one"),
            ConversationTurn::assistant("two"),
            ConversationTurn::user("three"),
            ConversationTurn::error_placeholder("service unavailable"),
        ];
        let msgs = assemble(&prior, "four", &[]).unwrap();
        let texts: Vec<String> = msgs.iter().map(Message::joined_text).collect();
        assert_eq!(texts, vec!["one", "two", "three", "four"]);
        assert_eq!(msgs[1].role, Role::Assistant);
        assert_eq!(msgs.last().unwrap().role, Role::User);
    }

    #[test]
    fn prior_turns_without_parts_are_skipped() {
        let prior = vec![
            ConversationTurn::user(""),
            ConversationTurn::assistant("nice picture"),
        ];
        let msgs = assemble(&prior, "thanks", &[]).unwrap();
        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().all(|m| !m.parts.is_empty()));
        assert_eq!(msgs[0].joined_text(), "nice picture");
    }

    #[test]
    fn prior_attachments_are_carried() {
        let prior = vec![ConversationTurn::user("look").with_attachments(vec![png()])];
        let msgs = assemble(&prior, "and now?", &[]).unwrap();
        assert_eq!(msgs[0].parts.len(), 2);
    }
}
