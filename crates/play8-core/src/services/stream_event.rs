use serde::Deserialize;
use serde_json::Value;

/// One server event of a chat turn, keyed by its `type` field.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    TextDelta {
        #[serde(default)]
        content: String,
    },
    ToolUseStart {
        #[serde(default)]
        name: Option<String>,
    },
    ToolUseDelta {
        #[serde(default)]
        content: String,
    },
    ToolUseEnd {
        #[serde(default)]
        result: String,
    },
    CardSaved {
        content_block_id: String,
        #[serde(default)]
        result: String,
    },
    Done {
        #[serde(default)]
        title: Option<String>,
    },
    /// Event types this client does not know about. Skipped by the interpreter.
    #[serde(other)]
    Unknown,
}

/// A decoded `data:` record: the event plus the conversation id any event may carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRecord {
    pub event: StreamEvent,
    pub conversation_id: Option<String>,
}

impl StreamRecord {
    pub fn new(event: StreamEvent) -> Self {
        Self {
            event,
            conversation_id: None,
        }
    }

    /// Parse the JSON payload that follows `data: `.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(payload)?;
        let conversation_id = value
            .get("conversation_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let event = serde_json::from_value(value)?;
        Ok(Self {
            event,
            conversation_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_text_delta_with_conversation_id() {
        let record =
            StreamRecord::from_json(r#"{"type":"text_delta","content":"Hi","conversation_id":"c1"}"#)
                .unwrap();
        assert_eq!(
            record.event,
            StreamEvent::TextDelta {
                content: "Hi".into()
            }
        );
        assert_eq!(record.conversation_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_parses_tool_use_start_without_payload() {
        let record = StreamRecord::from_json(r#"{"type":"tool_use_start"}"#).unwrap();
        assert_eq!(record.event, StreamEvent::ToolUseStart { name: None });
    }

    #[test]
    fn test_done_title_is_optional() {
        let record = StreamRecord::from_json(r#"{"type":"done"}"#).unwrap();
        assert_eq!(record.event, StreamEvent::Done { title: None });
    }

    #[test]
    fn test_unknown_type_is_kept_as_unknown() {
        let record = StreamRecord::from_json(r#"{"type":"ping","at":1}"#).unwrap();
        assert_eq!(record.event, StreamEvent::Unknown);
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        assert!(StreamRecord::from_json("{not json").is_err());
        assert!(StreamRecord::from_json(r#"{"content":"no type"}"#).is_err());
        assert!(StreamRecord::from_json(r#"{"type":"card_saved","result":"[]"}"#).is_err());
        assert!(StreamRecord::from_json(r#"[1,2]"#).is_err());
    }
}
