use serde::{Deserialize, Serialize};

/// Shown in place of the assistant reply when a turn fails.
pub const APOLOGY_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Wire shape of a message: what the backend receives as history and returns in details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of a message held by the session.
///
/// `Pending` is the in-flight assistant reply that grows while a turn streams;
/// it collapses into `Final` once the turn ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    Final(String),
    Pending(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    role: Role,
    body: MessageBody,
}

impl ChatMessage {
    pub fn finished(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            body: MessageBody::Final(content.into()),
        }
    }

    pub(crate) fn pending_assistant() -> Self {
        Self {
            role: Role::Assistant,
            body: MessageBody::Pending(String::new()),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        match &self.body {
            MessageBody::Final(text) | MessageBody::Pending(text) => text,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.body, MessageBody::Pending(_))
    }

    pub(crate) fn push_text(&mut self, text: &str) -> bool {
        match &mut self.body {
            MessageBody::Pending(buffer) => {
                buffer.push_str(text);
                true
            }
            MessageBody::Final(_) => false,
        }
    }

    pub(crate) fn seal(&mut self) {
        if let MessageBody::Pending(buffer) = &mut self.body {
            let text = std::mem::take(buffer);
            self.body = MessageBody::Final(text);
        }
    }

    pub fn to_wire(&self) -> Message {
        Message {
            role: self.role,
            content: self.content().to_string(),
        }
    }
}

impl From<Message> for ChatMessage {
    fn from(message: Message) -> Self {
        Self::finished(message.role, message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_accumulates_then_seals() {
        let mut msg = ChatMessage::pending_assistant();
        assert!(msg.push_text("Hel"));
        assert!(msg.push_text("lo"));
        assert!(msg.is_pending());
        msg.seal();
        assert!(!msg.is_pending());
        assert_eq!(msg.content(), "Hello");
        assert!(!msg.push_text("!"));
        assert_eq!(msg.content(), "Hello");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
