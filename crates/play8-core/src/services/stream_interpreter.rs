//! Folds the records of one chat turn into the conversation session.
//!
//! The interpreter holds only per-turn state (phase, tool argument buffer,
//! the placeholder card of the pending tool call). Everything that outlives
//! the turn lives in [`ConversationSession`]. Each applied record returns the
//! [`TurnEffect`]s the caller has to propagate to the catalog, navigation and
//! event subscribers.

use tracing::{debug, warn};

use super::stream_event::{StreamEvent, StreamRecord};
use super::tool_result_parser::{parse_card_titles, parse_tool_result};
use crate::models::card::{CardId, StreamingSection};
use crate::models::conversation_session::ConversationSession;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TurnPhase {
    #[default]
    Idle,
    AwaitingFirstToken,
    Streaming,
    ToolPending,
    Done,
    Errored,
}

impl TurnPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnPhase::Done | TurnPhase::Errored)
    }
}

/// Side effects of a record beyond the session itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnEffect {
    TextAppended(String),
    CardsChanged,
    /// The backend assigned an id to a conversation that had none.
    ConversationAssigned(String),
    TitleAssigned {
        conversation_id: Option<String>,
        title: String,
    },
}

#[derive(Debug, Default)]
pub struct StreamInterpreter {
    phase: TurnPhase,
    tool_arguments: String,
    pending_card: Option<CardId>,
    conversation_known: bool,
}

impl StreamInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Arguments streamed so far for the pending tool call.
    pub fn tool_arguments(&self) -> &str {
        &self.tool_arguments
    }

    /// Start a turn: the request is about to be sent.
    pub fn begin(&mut self, session: &ConversationSession) {
        self.phase = TurnPhase::AwaitingFirstToken;
        self.tool_arguments.clear();
        self.pending_card = None;
        self.conversation_known = session.active_conversation_id().is_some();
    }

    /// The response was accepted; add the assistant placeholder.
    pub fn open(&mut self, session: &mut ConversationSession) {
        session.begin_assistant_message();
    }

    pub fn apply(
        &mut self,
        record: StreamRecord,
        session: &mut ConversationSession,
    ) -> Vec<TurnEffect> {
        let mut effects = Vec::new();

        if let Some(id) = record.conversation_id
            && !self.conversation_known
        {
            self.conversation_known = true;
            session.assign_conversation(id.clone());
            effects.push(TurnEffect::ConversationAssigned(id));
        }

        if self.phase == TurnPhase::AwaitingFirstToken {
            self.phase = TurnPhase::Streaming;
        }

        match record.event {
            StreamEvent::TextDelta { content } => {
                if self.phase.is_terminal() {
                    warn!("Ignoring text after the turn finished");
                } else if session.append_assistant_text(&content) {
                    effects.push(TurnEffect::TextAppended(content));
                }
            }
            StreamEvent::ToolUseStart { name } => {
                debug!(tool = ?name, "Tool call started");
                self.tool_arguments.clear();
                if let Some(stale) = self.pending_card.take() {
                    session.complete_tool_cards(Some(stale), Vec::new());
                }
                self.pending_card = Some(session.push_streaming_card());
                self.phase = TurnPhase::ToolPending;
                effects.push(TurnEffect::CardsChanged);
            }
            StreamEvent::ToolUseDelta { content } => {
                self.tool_arguments.push_str(&content);
                if let Some(card) = self.pending_card {
                    let before = session.card(card).and_then(|c| c.streaming_section);
                    let section = streaming_section(&self.tool_arguments);
                    if section != before {
                        session.set_streaming_section(card, section);
                        effects.push(TurnEffect::CardsChanged);
                    }
                }
            }
            StreamEvent::ToolUseEnd { result } => {
                let contents = parse_tool_result(&result);
                debug!(cards = contents.len(), "Tool call finished");
                session.complete_tool_cards(self.pending_card.take(), contents);
                self.tool_arguments.clear();
                if !self.phase.is_terminal() {
                    self.phase = TurnPhase::Streaming;
                }
                effects.push(TurnEffect::CardsChanged);
            }
            StreamEvent::CardSaved {
                content_block_id,
                result,
            } => {
                let titles = parse_card_titles(&result);
                if session.confirm_saved(&content_block_id, &titles) > 0 {
                    effects.push(TurnEffect::CardsChanged);
                }
            }
            StreamEvent::Done { title } => {
                if let Some(title) = title.filter(|t| !t.is_empty())
                    && session.title().is_none()
                {
                    session.set_title(title.clone());
                    effects.push(TurnEffect::TitleAssigned {
                        conversation_id: session.active_conversation_id().map(str::to_string),
                        title,
                    });
                }
                self.complete(session);
            }
            StreamEvent::Unknown => debug!("Skipping unknown stream event"),
        }

        effects
    }

    /// The body ended. A turn that never sent `done` still counts as complete.
    pub fn finish(&mut self, session: &mut ConversationSession) {
        if !self.phase.is_terminal() {
            self.complete(session);
        }
    }

    /// Transport failure: abandon the reply and show the apology.
    pub fn fail(&mut self, session: &mut ConversationSession) {
        self.pending_card = None;
        self.tool_arguments.clear();
        self.phase = TurnPhase::Errored;
        session.fail_turn();
    }

    fn complete(&mut self, session: &mut ConversationSession) {
        self.pending_card = None;
        self.tool_arguments.clear();
        self.phase = TurnPhase::Done;
        session.finish_turn();
    }
}

/// The card section the generator is writing, judged by the last section key
/// present in the partial tool arguments.
fn streaming_section(arguments: &str) -> Option<StreamingSection> {
    [
        ("\"overview\"", StreamingSection::Overview),
        ("\"steps\"", StreamingSection::Steps),
        ("\"tips\"", StreamingSection::Tips),
    ]
    .into_iter()
    .filter_map(|(key, section)| arguments.rfind(key).map(|pos| (pos, section)))
    .max_by_key(|(pos, _)| *pos)
    .map(|(_, section)| section)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::card::CardCategory;
    use crate::models::message::{APOLOGY_MESSAGE, Role};

    fn record(json: &str) -> StreamRecord {
        StreamRecord::from_json(json).unwrap()
    }

    fn started() -> (StreamInterpreter, ConversationSession) {
        let mut session = ConversationSession::new();
        session.start_turn("hi").unwrap();
        let mut interpreter = StreamInterpreter::new();
        interpreter.begin(&session);
        interpreter.open(&mut session);
        (interpreter, session)
    }

    #[test]
    fn test_text_deltas_concatenate_and_done_sets_title() {
        let (mut interpreter, mut session) = started();
        assert_eq!(interpreter.phase(), TurnPhase::AwaitingFirstToken);

        interpreter.apply(record(r#"{"type":"text_delta","content":"Hel"}"#), &mut session);
        assert_eq!(interpreter.phase(), TurnPhase::Streaming);
        interpreter.apply(record(r#"{"type":"text_delta","content":"lo"}"#), &mut session);
        let effects = interpreter.apply(
            record(r#"{"type":"done","title":"Greeting"}"#),
            &mut session,
        );

        assert_eq!(interpreter.phase(), TurnPhase::Done);
        let reply = session.messages().last().unwrap();
        assert_eq!(reply.role(), Role::Assistant);
        assert_eq!(reply.content(), "Hello");
        assert!(!reply.is_pending());
        assert!(!session.is_busy());
        assert_eq!(session.title(), Some("Greeting"));
        assert!(effects.contains(&TurnEffect::TitleAssigned {
            conversation_id: None,
            title: "Greeting".into()
        }));
    }

    #[test]
    fn test_conversation_id_assigned_once() {
        let (mut interpreter, mut session) = started();
        let first = interpreter.apply(
            record(r#"{"type":"text_delta","content":"a","conversation_id":"c1"}"#),
            &mut session,
        );
        let second = interpreter.apply(
            record(r#"{"type":"text_delta","content":"b","conversation_id":"c2"}"#),
            &mut session,
        );
        assert!(first.contains(&TurnEffect::ConversationAssigned("c1".into())));
        assert!(
            !second
                .iter()
                .any(|e| matches!(e, TurnEffect::ConversationAssigned(_)))
        );
        assert_eq!(session.active_conversation_id(), Some("c1"));
    }

    #[test]
    fn test_known_conversation_is_not_reassigned() {
        let mut session = ConversationSession::new();
        session.assign_conversation("existing");
        session.start_turn("hi").unwrap();
        let mut interpreter = StreamInterpreter::new();
        interpreter.begin(&session);
        interpreter.open(&mut session);
        let effects = interpreter.apply(
            record(r#"{"type":"text_delta","content":"a","conversation_id":"existing"}"#),
            &mut session,
        );
        assert!(
            !effects
                .iter()
                .any(|e| matches!(e, TurnEffect::ConversationAssigned(_)))
        );
    }

    #[test]
    fn test_tool_call_produces_cards() {
        let (mut interpreter, mut session) = started();
        interpreter.apply(record(r#"{"type":"tool_use_start"}"#), &mut session);
        assert_eq!(interpreter.phase(), TurnPhase::ToolPending);
        assert_eq!(session.cards().len(), 1);
        assert!(session.cards()[0].is_streaming);

        interpreter.apply(
            record(r#"{"type":"tool_use_delta","content":"{\"overview\": \"x\", \"steps\": ["}"#),
            &mut session,
        );
        assert_eq!(
            session.cards()[0].streaming_section,
            Some(StreamingSection::Steps)
        );

        interpreter.apply(
            record(
                r#"{"type":"tool_use_end","result":"[{\"title\":\"Drill A\",\"content\":{\"steps\":[\"a\",\"b\"]}}]"}"#,
            ),
            &mut session,
        );
        assert_eq!(interpreter.phase(), TurnPhase::Streaming);
        assert!(interpreter.tool_arguments().is_empty());
        assert_eq!(session.cards().len(), 1);
        let card = &session.cards()[0];
        assert_eq!(card.title(), "Drill A");
        assert_eq!(card.steps(), &["a".to_string(), "b".to_string()]);
        assert_eq!(card.content.category, CardCategory::Training);
        assert!(!card.is_streaming);
    }

    #[test]
    fn test_malformed_tool_result_yields_no_cards() {
        let (mut interpreter, mut session) = started();
        interpreter.apply(record(r#"{"type":"tool_use_start"}"#), &mut session);
        interpreter.apply(
            record(r#"{"type":"tool_use_end","result":"not json"}"#),
            &mut session,
        );
        assert!(session.cards().is_empty());
    }

    #[test]
    fn test_card_saved_attaches_block_id() {
        let (mut interpreter, mut session) = started();
        interpreter.apply(record(r#"{"type":"tool_use_start"}"#), &mut session);
        interpreter.apply(
            record(r#"{"type":"tool_use_end","result":"[{\"title\":\"Drill A\"}]"}"#),
            &mut session,
        );
        interpreter.apply(record(r#"{"type":"done"}"#), &mut session);
        let effects = interpreter.apply(
            record(
                r#"{"type":"card_saved","content_block_id":"blk-7","result":"[{\"title\":\"Drill A\"}]"}"#,
            ),
            &mut session,
        );
        assert_eq!(effects, vec![TurnEffect::CardsChanged]);
        assert_eq!(
            session.cards()[0].content_block_id.as_deref(),
            Some("blk-7")
        );
    }

    #[test]
    fn test_text_after_done_is_ignored() {
        let (mut interpreter, mut session) = started();
        interpreter.apply(record(r#"{"type":"text_delta","content":"ok"}"#), &mut session);
        interpreter.apply(record(r#"{"type":"done"}"#), &mut session);
        interpreter.apply(record(r#"{"type":"text_delta","content":"late"}"#), &mut session);
        assert_eq!(session.messages().last().unwrap().content(), "ok");
    }

    #[test]
    fn test_finish_without_done_completes() {
        let (mut interpreter, mut session) = started();
        interpreter.apply(record(r#"{"type":"text_delta","content":"partial"}"#), &mut session);
        interpreter.apply(record(r#"{"type":"tool_use_start"}"#), &mut session);
        interpreter.finish(&mut session);
        assert_eq!(interpreter.phase(), TurnPhase::Done);
        assert!(session.cards().is_empty());
        assert_eq!(session.messages().last().unwrap().content(), "partial");
        assert!(!session.is_busy());
    }

    #[test]
    fn test_fail_appends_apology() {
        let (mut interpreter, mut session) = started();
        interpreter.apply(record(r#"{"type":"text_delta","content":"par"}"#), &mut session);
        interpreter.fail(&mut session);
        assert_eq!(interpreter.phase(), TurnPhase::Errored);
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].content(), APOLOGY_MESSAGE);
        assert!(!session.is_busy());
    }

    #[test]
    fn test_streaming_section_uses_last_key() {
        assert_eq!(streaming_section(""), None);
        assert_eq!(
            streaming_section(r#"{"overview":"a"#),
            Some(StreamingSection::Overview)
        );
        assert_eq!(
            streaming_section(r#"{"overview":"a","steps":[],"tips":["#),
            Some(StreamingSection::Tips)
        );
    }
}
