use std::future::Future;
use std::pin::Pin;

use super::error::ApiResult;
use crate::models::conversation::{ChatRequest, ConversationDetail, ConversationSummary};
use crate::models::plan::{NewPlanItem, PlanItem};
use crate::services::sse_decoder::RecordStream;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Backend operations used by the chat, catalog and plan features.
///
/// Every call returns an owned future so callers can spawn it or await it
/// without holding a borrow of the repository.
pub trait AgentRepository: Send + Sync + 'static {
    /// Open a chat turn. Resolves once the response status is known; the
    /// records then arrive through the returned stream.
    fn send_chat(&self, request: ChatRequest) -> BoxFuture<'static, ApiResult<RecordStream>>;

    fn list_conversations(&self) -> BoxFuture<'static, ApiResult<Vec<ConversationSummary>>>;

    fn get_conversation(&self, id: &str) -> BoxFuture<'static, ApiResult<ConversationDetail>>;

    fn delete_conversation(&self, id: &str) -> BoxFuture<'static, ApiResult<()>>;

    fn update_block_progress(
        &self,
        content_block_id: &str,
        checked_steps: Vec<bool>,
    ) -> BoxFuture<'static, ApiResult<()>>;

    fn list_plan(&self) -> BoxFuture<'static, ApiResult<Vec<PlanItem>>>;

    fn add_plan_item(&self, item: NewPlanItem) -> BoxFuture<'static, ApiResult<PlanItem>>;

    fn update_plan_progress(
        &self,
        id: &str,
        checked_steps: Vec<bool>,
    ) -> BoxFuture<'static, ApiResult<PlanItem>>;

    fn remove_plan_item(&self, id: &str) -> BoxFuture<'static, ApiResult<()>>;
}
