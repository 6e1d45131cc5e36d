use thiserror::Error;
use tracing::debug;

use super::card::{Card, CardContent, CardId, StreamingSection, normalize_checked};
use super::conversation::{BlockType, ChatRequest, ConversationDetail};
use super::message::{APOLOGY_MESSAGE, ChatMessage, Role};
use crate::services::tool_result_parser::parse_tool_result;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("A reply is already being generated")]
    TurnInFlight,

    #[error("Conversation already has messages")]
    NotFresh,
}

/// An outbound turn, tagged with the session generation it was issued for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnRequest {
    pub request: ChatRequest,
    pub generation: u64,
}

/// State of the conversation currently shown: messages, generated cards and
/// the flags that gate the send control.
///
/// `generation` changes whenever the session is cleared or switched, so async
/// results issued for an earlier generation can be recognised and dropped.
#[derive(Debug, Default)]
pub struct ConversationSession {
    messages: Vec<ChatMessage>,
    cards: Vec<Card>,
    active_conversation_id: Option<String>,
    title: Option<String>,
    is_loading: bool,
    is_streaming: bool,
    next_card_id: u64,
    generation: u64,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|card| card.id == id)
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.active_conversation_id.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn is_busy(&self) -> bool {
        self.is_loading || self.is_streaming
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Append the user's message and describe the request to send.
    ///
    /// The history carries every message before this one, role and content only.
    pub fn start_turn(&mut self, text: &str) -> Result<TurnRequest, SessionError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if self.is_busy() {
            return Err(SessionError::TurnInFlight);
        }

        let conversation_history = self.messages.iter().map(ChatMessage::to_wire).collect();
        self.messages.push(ChatMessage::finished(Role::User, trimmed));
        self.is_loading = true;

        Ok(TurnRequest {
            request: ChatRequest {
                message: trimmed.to_string(),
                conversation_history,
                conversation_id: self.active_conversation_id.clone(),
            },
            generation: self.generation,
        })
    }

    /// Add the in-flight assistant placeholder once the response starts.
    pub fn begin_assistant_message(&mut self) {
        if !self.messages.iter().any(ChatMessage::is_pending) {
            self.messages.push(ChatMessage::pending_assistant());
        }
        self.is_streaming = true;
    }

    pub fn append_assistant_text(&mut self, text: &str) -> bool {
        match self.messages.iter_mut().rev().find(|m| m.is_pending()) {
            Some(message) => message.push_text(text),
            None => false,
        }
    }

    pub fn assign_conversation(&mut self, id: impl Into<String>) {
        self.active_conversation_id = Some(id.into());
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    fn allocate_card_id(&mut self) -> CardId {
        self.next_card_id += 1;
        CardId(self.next_card_id)
    }

    /// Append an empty card that is being generated.
    pub fn push_streaming_card(&mut self) -> CardId {
        let id = self.allocate_card_id();
        self.cards.push(Card::placeholder(id));
        id
    }

    pub fn set_streaming_section(&mut self, id: CardId, section: Option<StreamingSection>) {
        if let Some(card) = self.cards.iter_mut().find(|card| card.id == id) {
            card.streaming_section = section;
        }
    }

    /// Replace the tool's placeholder with the finished cards it produced.
    pub fn complete_tool_cards(
        &mut self,
        placeholder: Option<CardId>,
        contents: Vec<CardContent>,
    ) -> Vec<CardId> {
        if let Some(placeholder) = placeholder {
            self.cards.retain(|card| card.id != placeholder);
        }
        contents
            .into_iter()
            .map(|content| {
                let id = self.allocate_card_id();
                self.cards.push(Card::completed(id, content));
                id
            })
            .collect()
    }

    /// Attach a persisted content block id to the cards it confirms.
    ///
    /// Cards are matched by title: for each title the most recent card with
    /// that title and no block id yet receives it. Two unsaved cards sharing a
    /// title cannot be told apart.
    pub fn confirm_saved(&mut self, content_block_id: &str, titles: &[String]) -> usize {
        let mut confirmed = 0;
        for title in titles {
            let target = self
                .cards
                .iter_mut()
                .rev()
                .find(|card| card.content_block_id.is_none() && card.content.title == *title);
            match target {
                Some(card) => {
                    card.content_block_id = Some(content_block_id.to_string());
                    confirmed += 1;
                }
                None => debug!(title = %title, "No unsaved card matches saved title"),
            }
        }
        confirmed
    }

    pub fn set_checked_steps(&mut self, id: CardId, checked: Vec<bool>) -> bool {
        match self.cards.iter_mut().find(|card| card.id == id) {
            Some(card) => {
                card.checked_steps = Some(checked);
                true
            }
            None => false,
        }
    }

    fn drop_streaming_cards(&mut self) {
        self.cards.retain(|card| !card.is_streaming);
    }

    /// End the turn normally: the placeholder becomes a regular message.
    pub fn finish_turn(&mut self) {
        for message in &mut self.messages {
            message.seal();
        }
        self.drop_streaming_cards();
        self.is_loading = false;
        self.is_streaming = false;
    }

    /// End the turn on failure: the partial reply is replaced by an apology.
    pub fn fail_turn(&mut self) {
        self.messages.retain(|m| !m.is_pending());
        self.messages
            .push(ChatMessage::finished(Role::Assistant, APOLOGY_MESSAGE));
        self.drop_streaming_cards();
        self.is_loading = false;
        self.is_streaming = false;
    }

    /// End the turn without a reply (the user has to sign in first).
    pub fn cancel_turn(&mut self) {
        self.messages.retain(|m| !m.is_pending());
        self.drop_streaming_cards();
        self.is_loading = false;
        self.is_streaming = false;
    }

    /// Forget everything about the current conversation.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.cards.clear();
        self.active_conversation_id = None;
        self.title = None;
        self.is_loading = false;
        self.is_streaming = false;
        self.generation += 1;
    }

    /// Start showing conversation `id`; its history arrives through `load_detail`.
    pub fn begin_switch(&mut self, id: &str) -> u64 {
        self.clear();
        self.active_conversation_id = Some(id.to_string());
        self.generation
    }

    /// Replace messages wholesale and rebuild the cards from the tool blocks.
    pub fn load_detail(&mut self, detail: ConversationDetail) {
        self.messages.clear();
        self.cards.clear();
        self.active_conversation_id = Some(detail.id.clone());
        self.title = detail.title.clone();

        for message in &detail.messages {
            for block in message.ordered_blocks() {
                if block.block_type != BlockType::ToolUse {
                    continue;
                }
                for content in parse_tool_result(&block.content) {
                    let checked = block
                        .checked_steps
                        .as_deref()
                        .map(|checked| normalize_checked(Some(checked), content.steps.len()));
                    let id = self.allocate_card_id();
                    let mut card = Card::completed(id, content);
                    card.content_block_id = Some(block.id.clone());
                    card.checked_steps = checked;
                    self.cards.push(card);
                }
            }
        }

        self.messages = detail
            .messages
            .into_iter()
            .map(|message| ChatMessage::finished(message.role, message.content))
            .collect();
    }
}
