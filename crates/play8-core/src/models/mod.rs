pub mod card;
pub mod card_progress;
pub mod conversation;
pub mod conversation_session;
pub mod conversations_store;
pub mod message;
pub mod plan;
pub mod stream_manager;
pub mod studio_catalog;

pub use card::{
    Card, CardCategory, CardContent, CardId, Difficulty, StepProgress, StreamingSection,
};
pub use card_progress::{ProgressError, toggled_steps};
pub use conversation::{
    BlockType, ChatRequest, ContentBlock, ConversationDetail, ConversationSummary, DetailMessage,
};
pub use conversation_session::{ConversationSession, SessionError, TurnRequest};
pub use conversations_store::ConversationsStore;
pub use message::{APOLOGY_MESSAGE, ChatMessage, Message, Role};
pub use plan::{NewPlanItem, PlanColumns, PlanItem, PlanStatus};
pub use stream_manager::{StreamManager, StreamManagerEvent, TurnStatus};
pub use studio_catalog::{StudioCard, StudioCatalog};
