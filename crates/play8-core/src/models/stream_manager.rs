use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const EVENT_CAPACITY: usize = 256;

/// How a chat turn ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnStatus {
    Completed,
    Failed(String),
    LoginRequired,
    /// The user moved to another conversation before the turn ended.
    Cancelled,
}

/// Events emitted for decoupled UI updates.
/// Session-scoped variants carry the session `generation` so subscribers can
/// ignore anything from a conversation that is no longer shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamManagerEvent {
    TurnStarted {
        generation: u64,
    },
    TextChunk {
        generation: u64,
        text: String,
    },
    CardsChanged {
        generation: u64,
    },
    ConversationAssigned {
        generation: u64,
        conversation_id: String,
    },
    TitleAssigned {
        generation: u64,
        conversation_id: String,
        title: String,
    },
    TurnEnded {
        generation: u64,
        status: TurnStatus,
    },
    /// The session was cleared or switched; views should re-read it.
    SessionReset {
        generation: u64,
    },
    /// The conversation list changed (loaded, entry added, renamed or removed).
    CatalogChanged,
}

struct ActiveTurn {
    generation: u64,
    cancel_flag: Arc<AtomicBool>,
}

/// Tracks the lifecycle of the chat turn in flight and broadcasts events.
///
/// Does not hold message text; the session is the single owner of content.
/// At most one turn is active. Registering a new one cancels the previous.
pub struct StreamManager {
    sender: broadcast::Sender<StreamManagerEvent>,
    active: Mutex<Option<ActiveTurn>>,
}

impl StreamManager {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sender,
            active: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamManagerEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: StreamManagerEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    /// Register the turn for `generation` and return its cancellation flag.
    pub fn register_turn(&self, generation: u64) -> Arc<AtomicBool> {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let previous = self.active.lock().replace(ActiveTurn {
            generation,
            cancel_flag: cancel_flag.clone(),
        });
        if let Some(previous) = previous {
            previous.cancel_flag.store(true, Ordering::Relaxed);
            debug!(
                generation = previous.generation,
                "Cancelled existing turn before registering new one"
            );
            self.emit(StreamManagerEvent::TurnEnded {
                generation: previous.generation,
                status: TurnStatus::Cancelled,
            });
        }
        self.emit(StreamManagerEvent::TurnStarted { generation });
        cancel_flag
    }

    /// Mark the turn as ended and emit `TurnEnded`.
    ///
    /// Ignored when the turn is no longer the registered one (it was
    /// cancelled and already reported).
    pub fn finalize_turn(&self, generation: u64, cancel_flag: &Arc<AtomicBool>, status: TurnStatus) {
        {
            let mut active = self.active.lock();
            match active.as_ref() {
                Some(turn) if Arc::ptr_eq(&turn.cancel_flag, cancel_flag) => {
                    *active = None;
                }
                _ => {
                    debug!(generation, "finalize_turn called for a turn that is no longer active");
                    return;
                }
            }
        }
        if let TurnStatus::Failed(reason) = &status {
            warn!(generation, reason = %reason, "Chat turn failed");
        }
        self.emit(StreamManagerEvent::TurnEnded { generation, status });
    }

    /// Cancel the active turn, if any (used when the conversation changes).
    pub fn cancel_active(&self) {
        let Some(turn) = self.active.lock().take() else {
            return;
        };
        turn.cancel_flag.store(true, Ordering::Relaxed);
        debug!(generation = turn.generation, "Active turn cancelled");
        self.emit(StreamManagerEvent::TurnEnded {
            generation: turn.generation,
            status: TurnStatus::Cancelled,
        });
    }

    pub fn is_streaming(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.active.lock().as_ref().map(|turn| turn.generation)
    }
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}
