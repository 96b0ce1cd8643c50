use serde::{Deserialize, Serialize};

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message content: plain text, or multimodal parts when the chat layer has
/// already folded attachments in (images arrive as data URLs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
    Image { image: String },
}

impl MessageContent {
    /// Flatten to plain text. Image parts are dropped; text parts are joined
    /// with newlines.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => {
                let texts: Vec<&str> = parts
                    .iter()
                    .filter_map(|p| match p {
                        ContentPart::Text { text } => Some(text.as_str()),
                        ContentPart::Image { .. } => None,
                    })
                    .collect();
                texts.join("\n")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Text of the most recent user-authored message, if any.
pub fn last_user_query(messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_text_joins_text_parts_and_drops_images() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text {
                text: "look at this".to_string(),
            },
            ContentPart::Image {
                image: "data:image/png;base64,AAAA".to_string(),
            },
            ContentPart::Text {
                text: "what is it?".to_string(),
            },
        ]);
        assert_eq!(content.as_text(), "look at this\nwhat is it?");
    }

    #[test]
    fn last_user_query_picks_most_recent_user_message() {
        let messages = vec![
            ChatMessage::user("first question"),
            ChatMessage::assistant("an answer"),
            ChatMessage::user("second question"),
            ChatMessage::assistant("another answer"),
        ];
        assert_eq!(
            last_user_query(&messages).as_deref(),
            Some("second question")
        );
    }

    #[test]
    fn last_user_query_none_without_user_messages() {
        let messages = vec![
            ChatMessage::system("be terse"),
            ChatMessage::assistant("hello"),
        ];
        assert_eq!(last_user_query(&messages), None);
    }

    #[test]
    fn content_deserializes_from_string_or_parts() {
        let text: MessageContent = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(text, MessageContent::Text("hello".to_string()));

        let parts: MessageContent =
            serde_json::from_str(r#"[{"type":"text","text":"hi"}]"#).unwrap();
        assert_eq!(
            parts,
            MessageContent::Parts(vec![ContentPart::Text {
                text: "hi".to_string()
            }])
        );
    }
}
