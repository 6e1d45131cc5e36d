use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::{Message, Role};

/// Lightweight conversation metadata used for the picker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn new(id: impl Into<String>, title: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => "New conversation",
        }
    }

    /// Short relative label for the last update: `Today`, `Yesterday`, `3d ago`
    /// or the calendar date once a week has passed.
    pub fn recency_label(&self, now: DateTime<Utc>) -> String {
        let days = (now - self.updated_at).num_days();
        match days {
            d if d <= 0 => "Today".to_string(),
            1 => "Yesterday".to_string(),
            d if d < 7 => format!("{d}d ago"),
            _ => self.updated_at.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Text,
    ToolUse,
}

/// A persisted piece of an assistant message: plain text or a tool result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub checked_steps: Option<Vec<bool>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_blocks: Vec<ContentBlock>,
}

impl DetailMessage {
    /// Content blocks in their persisted order.
    pub fn ordered_blocks(&self) -> Vec<&ContentBlock> {
        let mut blocks: Vec<&ContentBlock> = self.content_blocks.iter().collect();
        blocks.sort_by_key(|block| block.order);
        blocks
    }
}

/// Full history of one conversation, loaded when switching to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<DetailMessage>,
}

impl ConversationDetail {
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Body of `POST /agent/chat`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_history: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn summary_updated(at: DateTime<Utc>) -> ConversationSummary {
        ConversationSummary::new("c1", None, at)
    }

    #[test]
    fn test_recency_label() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        assert_eq!(summary_updated(now).recency_label(now), "Today");
        assert_eq!(
            summary_updated(now - Duration::hours(30)).recency_label(now),
            "Yesterday"
        );
        assert_eq!(
            summary_updated(now - Duration::days(4)).recency_label(now),
            "4d ago"
        );
        assert_eq!(
            summary_updated(now - Duration::days(10)).recency_label(now),
            "2024-05-31"
        );
    }

    #[test]
    fn test_display_title_fallback() {
        let now = Utc::now();
        assert_eq!(summary_updated(now).display_title(), "New conversation");
        let titled = ConversationSummary::new("c2", Some("Serve drills".into()), now);
        assert_eq!(titled.display_title(), "Serve drills");
    }

    #[test]
    fn test_detail_deserializes_blocks() {
        let json = r#"{
            "id": "c1",
            "title": null,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z",
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello", "content_blocks": [
                    {"id": "b2", "type": "tool_use", "content": "[]", "order": 2, "checked_steps": [true]},
                    {"id": "b1", "type": "text", "content": "hello", "order": 1}
                ]}
            ]
        }"#;
        let detail: ConversationDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.messages.len(), 2);
        let blocks = detail.messages[1].ordered_blocks();
        assert_eq!(blocks[0].id, "b1");
        assert_eq!(blocks[1].block_type, BlockType::ToolUse);
        assert_eq!(blocks[1].checked_steps, Some(vec![true]));
    }

    #[test]
    fn test_chat_request_omits_missing_conversation_id() {
        let request = ChatRequest {
            message: "hi".into(),
            conversation_history: vec![],
            conversation_id: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("conversation_id").is_none());
    }
}
