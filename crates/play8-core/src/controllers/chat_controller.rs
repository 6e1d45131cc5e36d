use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use futures::StreamExt;
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::navigation::Navigator;
use crate::auth::AuthService;
use crate::models::card::{Card, CardId};
use crate::models::card_progress::{ProgressError, toggled_steps};
use crate::models::conversation::ConversationSummary;
use crate::models::conversation_session::{ConversationSession, SessionError};
use crate::models::conversations_store::ConversationsStore;
use crate::models::message::ChatMessage;
use crate::models::stream_manager::{StreamManager, StreamManagerEvent, TurnStatus};
use crate::repositories::{AgentRepository, ApiError};
use crate::services::progress_service::{PersistOutcome, ProgressPersistence};
use crate::services::stream_interpreter::{StreamInterpreter, TurnEffect, TurnPhase};

/// How a call to [`ChatController::send_message`] ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// The request or stream failed; the apology was shown.
    Failed,
    /// The backend asked for a sign-in; the login flow was started.
    LoginRequired,
    /// The conversation changed while the reply was streaming.
    Superseded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The conversation was already shown; nothing was fetched.
    AlreadyLoaded,
    Loaded,
    /// The conversation could not be loaded; the session was reset.
    Missing,
    /// Another switch or a new conversation happened while loading.
    Superseded,
}

#[derive(Default)]
struct ChatState {
    session: ConversationSession,
    catalog: ConversationsStore,
}

/// Coordinates the chat session, the conversation list and the backend.
///
/// Cheap to clone; clones share state. Every async operation is tagged with
/// the session generation it was issued for and drops its result when the
/// generation moved on in the meantime.
#[derive(Clone)]
pub struct ChatController {
    repository: Arc<dyn AgentRepository>,
    auth: Arc<dyn AuthService>,
    navigator: Arc<dyn Navigator>,
    progress: Arc<dyn ProgressPersistence>,
    streams: Arc<StreamManager>,
    state: Arc<Mutex<ChatState>>,
}

impl ChatController {
    pub fn new(
        repository: Arc<dyn AgentRepository>,
        auth: Arc<dyn AuthService>,
        navigator: Arc<dyn Navigator>,
        progress: Arc<dyn ProgressPersistence>,
    ) -> Self {
        Self {
            repository,
            auth,
            navigator,
            progress,
            streams: Arc::new(StreamManager::new()),
            state: Arc::new(Mutex::new(ChatState::default())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamManagerEvent> {
        self.streams.subscribe()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().session.messages().to_vec()
    }

    pub fn cards(&self) -> Vec<Card> {
        self.state.lock().session.cards().to_vec()
    }

    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.state.lock().catalog.list().to_vec()
    }

    pub fn active_conversation_id(&self) -> Option<String> {
        self.state
            .lock()
            .session
            .active_conversation_id()
            .map(str::to_string)
    }

    pub fn title(&self) -> Option<String> {
        self.state.lock().session.title().map(str::to_string)
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().session.is_busy()
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().session.generation()
    }

    /// All message text joined, used to suggest catalog cards.
    pub fn conversation_text(&self) -> String {
        self.state
            .lock()
            .session
            .messages()
            .iter()
            .map(ChatMessage::content)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Lock the state only if `generation` is still the current one.
    fn lock_current(&self, generation: u64) -> Option<MutexGuard<'_, ChatState>> {
        let state = self.state.lock();
        if state.session.generation() == generation {
            Some(state)
        } else {
            debug!(generation, "Dropping result for a conversation that is no longer shown");
            None
        }
    }

    /// Send the first message of a fresh session (e.g. handed over from a
    /// landing page).
    pub async fn send_initial_message(&self, text: &str) -> Result<TurnOutcome, SessionError> {
        {
            let state = self.state.lock();
            if !state.session.messages().is_empty()
                || state.session.active_conversation_id().is_some()
            {
                return Err(SessionError::NotFresh);
            }
        }
        self.send_message(text).await
    }

    /// Run one chat turn to completion.
    ///
    /// Returns an error only when the turn could not start (empty text, or a
    /// turn already in flight). Transport failures end in
    /// [`TurnOutcome::Failed`] with the apology appended.
    pub async fn send_message(&self, text: &str) -> Result<TurnOutcome, SessionError> {
        let (turn, mut interpreter) = {
            let mut state = self.state.lock();
            let turn = state.session.start_turn(text)?;
            let mut interpreter = StreamInterpreter::new();
            interpreter.begin(&state.session);
            (turn, interpreter)
        };
        let generation = turn.generation;
        let cancel_flag = self.streams.register_turn(generation);
        info!(
            generation,
            conv_id = ?turn.request.conversation_id,
            history = turn.request.conversation_history.len(),
            "Sending chat turn"
        );

        let mut records = match self.repository.send_chat(turn.request).await {
            Ok(records) => records,
            Err(ApiError::AuthenticationRequired) => {
                if let Some(mut state) = self.lock_current(generation) {
                    state.session.cancel_turn();
                }
                self.auth.login();
                self.streams
                    .finalize_turn(generation, &cancel_flag, TurnStatus::LoginRequired);
                return Ok(TurnOutcome::LoginRequired);
            }
            Err(e) => {
                warn!(error = ?e, generation, "Chat request failed");
                return Ok(self.fail_turn(generation, &cancel_flag, &mut interpreter, e));
            }
        };

        match self.lock_current(generation) {
            Some(mut state) => interpreter.open(&mut state.session),
            None => return Ok(TurnOutcome::Superseded),
        }

        // Once `done` arrives the turn is reported as completed and the next
        // turn may start, but the body stays open for `card_saved`
        // confirmations. From then on only a generation change stops reading.
        let mut completed = false;
        while let Some(item) = records.next().await {
            if !completed && cancel_flag.load(Ordering::Relaxed) {
                debug!(generation, "Turn cancelled, closing stream");
                return Ok(TurnOutcome::Superseded);
            }
            let record = match item {
                Ok(record) => record,
                Err(e) if completed => {
                    debug!(error = ?e, generation, "Chat stream broke after the turn completed");
                    return Ok(TurnOutcome::Completed);
                }
                Err(e) => {
                    warn!(error = ?e, generation, "Chat stream broke");
                    return Ok(self.fail_turn(generation, &cancel_flag, &mut interpreter, e));
                }
            };

            let effects = {
                let Some(mut state) = self.lock_current(generation) else {
                    return Ok(if completed {
                        TurnOutcome::Completed
                    } else {
                        TurnOutcome::Superseded
                    });
                };
                let state = &mut *state;
                let effects = interpreter.apply(record, &mut state.session);
                apply_catalog_effects(&mut state.catalog, &effects);
                effects
            };
            self.publish(generation, effects);

            if !completed && interpreter.phase() == TurnPhase::Done {
                completed = true;
                self.streams
                    .finalize_turn(generation, &cancel_flag, TurnStatus::Completed);
            }
        }

        if completed {
            return Ok(TurnOutcome::Completed);
        }
        match self.lock_current(generation) {
            Some(mut state) => interpreter.finish(&mut state.session),
            None => return Ok(TurnOutcome::Superseded),
        }
        self.streams
            .finalize_turn(generation, &cancel_flag, TurnStatus::Completed);
        Ok(TurnOutcome::Completed)
    }

    fn fail_turn(
        &self,
        generation: u64,
        cancel_flag: &Arc<std::sync::atomic::AtomicBool>,
        interpreter: &mut StreamInterpreter,
        error: ApiError,
    ) -> TurnOutcome {
        match self.lock_current(generation) {
            Some(mut state) => interpreter.fail(&mut state.session),
            None => return TurnOutcome::Superseded,
        }
        self.streams.finalize_turn(
            generation,
            cancel_flag,
            TurnStatus::Failed(error.to_string()),
        );
        TurnOutcome::Failed
    }

    /// Forward turn effects to navigation and subscribers (outside the lock).
    fn publish(&self, generation: u64, effects: Vec<TurnEffect>) {
        for effect in effects {
            match effect {
                TurnEffect::TextAppended(text) => {
                    self.streams
                        .emit(StreamManagerEvent::TextChunk { generation, text });
                }
                TurnEffect::CardsChanged => {
                    self.streams
                        .emit(StreamManagerEvent::CardsChanged { generation });
                }
                TurnEffect::ConversationAssigned(conversation_id) => {
                    info!(conv_id = %conversation_id, "Conversation assigned by backend");
                    self.navigator.show_conversation(&conversation_id);
                    self.streams.emit(StreamManagerEvent::ConversationAssigned {
                        generation,
                        conversation_id,
                    });
                    self.streams.emit(StreamManagerEvent::CatalogChanged);
                }
                TurnEffect::TitleAssigned {
                    conversation_id: Some(conversation_id),
                    title,
                } => {
                    self.streams.emit(StreamManagerEvent::TitleAssigned {
                        generation,
                        conversation_id,
                        title,
                    });
                    self.streams.emit(StreamManagerEvent::CatalogChanged);
                }
                TurnEffect::TitleAssigned {
                    conversation_id: None,
                    title,
                } => {
                    debug!(title = %title, "Title received before any conversation id");
                }
            }
        }
    }

    /// Show conversation `id`, loading its history from the backend.
    pub async fn switch_conversation(&self, id: &str) -> SwitchOutcome {
        let generation = {
            let mut state = self.state.lock();
            if state.session.active_conversation_id() == Some(id) {
                debug!(conv_id = %id, "Conversation already shown, skipping load");
                return SwitchOutcome::AlreadyLoaded;
            }
            self.streams.cancel_active();
            state.session.begin_switch(id)
        };
        self.streams
            .emit(StreamManagerEvent::SessionReset { generation });

        match self.repository.get_conversation(id).await {
            Ok(detail) => {
                let Some(mut state) = self.lock_current(generation) else {
                    return SwitchOutcome::Superseded;
                };
                state.session.load_detail(detail);
                drop(state);
                info!(conv_id = %id, "Conversation loaded");
                self.streams
                    .emit(StreamManagerEvent::SessionReset { generation });
                SwitchOutcome::Loaded
            }
            Err(e) => {
                let Some(mut state) = self.lock_current(generation) else {
                    return SwitchOutcome::Superseded;
                };
                warn!(error = ?e, conv_id = %id, "Failed to load conversation");
                state.session.clear();
                let generation = state.session.generation();
                drop(state);
                self.navigator.show_new_conversation();
                self.streams
                    .emit(StreamManagerEvent::SessionReset { generation });
                SwitchOutcome::Missing
            }
        }
    }

    /// Start over with an empty session.
    pub fn new_conversation(&self) {
        let generation = {
            let mut state = self.state.lock();
            self.streams.cancel_active();
            state.session.clear();
            state.session.generation()
        };
        self.navigator.show_new_conversation();
        self.streams
            .emit(StreamManagerEvent::SessionReset { generation });
    }

    /// Refresh the conversation list. Does nothing when signed out; failures
    /// leave the current list in place.
    pub async fn load_conversations(&self) {
        if !self.auth.is_authenticated() {
            debug!("Not signed in, skipping conversation list");
            return;
        }
        match self.repository.list_conversations().await {
            Ok(conversations) => {
                debug!(count = conversations.len(), "Conversation list loaded");
                self.state.lock().catalog.set_all(conversations);
                self.streams.emit(StreamManagerEvent::CatalogChanged);
            }
            Err(e) => warn!(error = ?e, "Failed to load conversations"),
        }
    }

    /// Remove a conversation locally right away, then on the backend.
    ///
    /// A backend failure is logged and the local removal stays.
    pub async fn delete_conversation(&self, id: &str) {
        let was_active = {
            let mut state = self.state.lock();
            state.catalog.remove(id);
            state.session.active_conversation_id() == Some(id)
        };
        self.streams.emit(StreamManagerEvent::CatalogChanged);
        if was_active {
            self.new_conversation();
        }

        if let Err(e) = self.repository.delete_conversation(id).await {
            warn!(error = ?e, conv_id = %id, "Failed to delete conversation");
        }
    }

    /// Flip one step of a generated card and save it when the card is persisted.
    ///
    /// Returns `None` when the card has no content block yet (local only).
    pub async fn toggle_card_step(
        &self,
        card_id: CardId,
        step_index: usize,
    ) -> Result<Option<PersistOutcome>, ProgressError> {
        let (generation, checked, block_id) = {
            let mut state = self.state.lock();
            let card = state
                .session
                .card(card_id)
                .ok_or(ProgressError::CardNotFound)?;
            let checked =
                toggled_steps(card.checked_steps.as_deref(), card.steps().len(), step_index)?;
            let block_id = card.content_block_id.clone();
            state.session.set_checked_steps(card_id, checked.clone());
            (state.session.generation(), checked, block_id)
        };
        self.streams
            .emit(StreamManagerEvent::CardsChanged { generation });

        let Some(block_id) = block_id else {
            debug!(card = ?card_id, "Card not saved yet, progress kept locally");
            return Ok(None);
        };
        Ok(Some(self.progress.persist_progress(&block_id, checked).await))
    }
}

fn apply_catalog_effects(catalog: &mut ConversationsStore, effects: &[TurnEffect]) {
    let now = Utc::now();
    for effect in effects {
        match effect {
            TurnEffect::ConversationAssigned(id) => {
                catalog.ensure(id, now);
            }
            TurnEffect::TitleAssigned {
                conversation_id: Some(id),
                title,
            } => catalog.upsert_from_done(id, title, now),
            _ => {}
        }
    }
}
