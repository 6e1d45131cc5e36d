//! Fakes shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::Utc;
use parking_lot::Mutex;

use crate::auth::AuthService;
use crate::controllers::chat_controller::ChatController;
use crate::controllers::navigation::Navigator;
use crate::models::conversation::{BlockType, ContentBlock, ConversationDetail, DetailMessage};
use crate::models::message::Role;
use crate::repositories::InMemoryAgentRepository;
use crate::services::progress_service::GeneratedCardProgress;

pub struct RecordingAuth {
    authenticated: AtomicBool,
    login_calls: AtomicUsize,
}

impl RecordingAuth {
    pub fn new(authenticated: bool) -> Self {
        Self {
            authenticated: AtomicBool::new(authenticated),
            login_calls: AtomicUsize::new(0),
        }
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::Relaxed)
    }
}

impl AuthService for RecordingAuth {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Relaxed)
    }

    fn login(&self) {
        self.login_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn logout(&self) {
        self.authenticated.store(false, Ordering::Relaxed);
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    shown: Mutex<Vec<String>>,
    new_conversation_calls: AtomicUsize,
}

impl RecordingNavigator {
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().clone()
    }

    pub fn new_conversation_calls(&self) -> usize {
        self.new_conversation_calls.load(Ordering::Relaxed)
    }
}

impl Navigator for RecordingNavigator {
    fn show_conversation(&self, id: &str) {
        self.shown.lock().push(id.to_string());
    }

    fn show_new_conversation(&self) {
        self.new_conversation_calls.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn controller_with(
    repo: &InMemoryAgentRepository,
    authenticated: bool,
) -> (ChatController, Arc<RecordingNavigator>, Arc<RecordingAuth>) {
    let navigator = Arc::new(RecordingNavigator::default());
    let auth = Arc::new(RecordingAuth::new(authenticated));
    let repository = Arc::new(repo.clone());
    let controller = ChatController::new(
        repository.clone(),
        auth.clone(),
        navigator.clone(),
        Arc::new(GeneratedCardProgress::new(repository)),
    );
    (controller, navigator, auth)
}

/// A stored conversation with one assistant reply holding a two-step card
/// saved as block `blk-<id>`.
pub fn detail_with_card(id: &str, card_title: &str) -> ConversationDetail {
    let now = Utc::now();
    let result = serde_json::json!([{
        "title": card_title,
        "content": { "steps": ["Warm up", "Hit 50 serves"] }
    }])
    .to_string();

    ConversationDetail {
        id: id.to_string(),
        title: Some(format!("{card_title} plan")),
        created_at: now,
        updated_at: now,
        messages: vec![
            DetailMessage {
                role: Role::User,
                content: format!("Make me a {card_title} plan"),
                content_blocks: vec![],
            },
            DetailMessage {
                role: Role::Assistant,
                content: "Here it is".to_string(),
                content_blocks: vec![ContentBlock {
                    id: format!("blk-{id}"),
                    block_type: BlockType::ToolUse,
                    content: result,
                    order: 0,
                    checked_steps: None,
                }],
            },
        ],
    }
}
