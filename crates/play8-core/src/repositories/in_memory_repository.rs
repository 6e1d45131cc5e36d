use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::channel::mpsc;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::agent_repository::{AgentRepository, BoxFuture};
use super::error::{ApiError, ApiResult};
use crate::models::conversation::{ChatRequest, ConversationDetail, ConversationSummary};
use crate::models::plan::{NewPlanItem, PlanItem, PlanStatus};
use crate::services::sse_decoder::{RecordStream, decode_byte_stream};

/// How the next chat request is answered.
enum ScriptedTurn {
    Chunks(Vec<Bytes>),
    ChunksThenError(Vec<Bytes>),
    Status(u16),
    Live(mpsc::UnboundedReceiver<Result<Bytes, ApiError>>),
}

/// Sender side of a chat turn whose body is fed by the test while it runs.
pub struct LiveTurn {
    sender: mpsc::UnboundedSender<Result<Bytes, ApiError>>,
}

impl LiveTurn {
    /// Send raw body bytes (not necessarily whole lines).
    pub fn send(&self, chunk: impl Into<Bytes>) {
        let _ = self.sender.unbounded_send(Ok(chunk.into()));
    }

    /// Send one `data:` record.
    pub fn send_record(&self, json: &str) {
        self.send(format!("data: {json}\n"));
    }

    /// Break the connection.
    pub fn fail(&self, message: &str) {
        let _ = self.sender.unbounded_send(Err(ApiError::unavailable(message)));
    }

    /// End the body normally.
    pub fn close(self) {
        self.sender.close_channel();
    }
}

/// Operations that can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    ListConversations,
    GetConversation,
    DeleteConversation,
    UpdateBlockProgress,
    ListPlan,
    AddPlanItem,
    UpdatePlanProgress,
    RemovePlanItem,
}

#[derive(Default)]
struct State {
    turns: VecDeque<ScriptedTurn>,
    chat_requests: Vec<ChatRequest>,
    conversations: HashMap<String, ConversationDetail>,
    plan: Vec<PlanItem>,
    next_plan_id: u64,
    failing: HashMap<Operation, u16>,
    calls: HashMap<Operation, usize>,
    block_updates: Vec<(String, Vec<bool>)>,
    plan_updates: Vec<(String, Vec<bool>)>,
    detail_gate: Option<Arc<Semaphore>>,
}

impl State {
    fn record(&mut self, op: Operation) -> ApiResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failing.get(&op) {
            Some(status) => Err(ApiError::from_status(*status)),
            None => Ok(()),
        }
    }
}

/// In-memory backend.
/// Useful for testing and offline development: chat turns are scripted as
/// raw body chunks, every other endpoint works against local collections.
#[derive(Clone, Default)]
pub struct InMemoryAgentRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a turn answered with these body chunks, then a clean end.
    pub fn push_chunks<I, B>(&self, chunks: I)
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.state.lock().turns.push_back(ScriptedTurn::Chunks(chunks));
    }

    /// Queue a turn whose records are given as JSON payloads, one line each.
    pub fn push_records(&self, records: &[&str]) {
        self.push_chunks(records.iter().map(|json| format!("data: {json}\n")));
    }

    /// Queue a turn that delivers `chunks` and then breaks mid-stream.
    pub fn push_chunks_then_error<I, B>(&self, chunks: I)
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.state
            .lock()
            .turns
            .push_back(ScriptedTurn::ChunksThenError(chunks));
    }

    /// Queue a turn rejected with an HTTP status.
    pub fn push_status(&self, status: u16) {
        self.state.lock().turns.push_back(ScriptedTurn::Status(status));
    }

    /// Queue a turn fed through the returned handle.
    pub fn push_live(&self) -> LiveTurn {
        let (sender, receiver) = mpsc::unbounded();
        self.state.lock().turns.push_back(ScriptedTurn::Live(receiver));
        LiveTurn { sender }
    }

    pub fn insert_conversation(&self, detail: ConversationDetail) {
        self.state
            .lock()
            .conversations
            .insert(detail.id.clone(), detail);
    }

    pub fn insert_plan_item(&self, mut item: PlanItem) {
        item.normalize();
        self.state.lock().plan.push(item);
    }

    /// Make `op` answer with HTTP `status` until cleared.
    pub fn fail(&self, op: Operation, status: u16) {
        self.state.lock().failing.insert(op, status);
    }

    pub fn recover(&self, op: Operation) {
        self.state.lock().failing.remove(&op);
    }

    /// Hold every conversation detail fetch until [`Self::release_details`].
    pub fn hold_details(&self) {
        self.state.lock().detail_gate = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_details(&self) {
        if let Some(gate) = self.state.lock().detail_gate.take() {
            gate.add_permits(Semaphore::MAX_PERMITS);
        }
    }

    pub fn calls(&self, op: Operation) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.state.lock().chat_requests.clone()
    }

    pub fn block_updates(&self) -> Vec<(String, Vec<bool>)> {
        self.state.lock().block_updates.clone()
    }

    pub fn plan_updates(&self) -> Vec<(String, Vec<bool>)> {
        self.state.lock().plan_updates.clone()
    }

    pub fn plan_items(&self) -> Vec<PlanItem> {
        self.state.lock().plan.clone()
    }

    pub fn has_conversation(&self, id: &str) -> bool {
        self.state.lock().conversations.contains_key(id)
    }
}

impl AgentRepository for InMemoryAgentRepository {
    fn send_chat(&self, request: ChatRequest) -> BoxFuture<'static, ApiResult<RecordStream>> {
        let turn = {
            let mut state = self.state.lock();
            state.chat_requests.push(request);
            state.turns.pop_front()
        };

        Box::pin(async move {
            match turn {
                Some(ScriptedTurn::Chunks(chunks)) => Ok(decode_byte_stream(
                    futures::stream::iter(chunks.into_iter().map(Ok::<_, ApiError>)),
                )),
                Some(ScriptedTurn::ChunksThenError(chunks)) => {
                    let items = chunks
                        .into_iter()
                        .map(Ok)
                        .chain(std::iter::once(Err(ApiError::unavailable(
                            "connection reset",
                        ))));
                    Ok(decode_byte_stream(futures::stream::iter(items)))
                }
                Some(ScriptedTurn::Status(status)) => Err(ApiError::from_status(status)),
                Some(ScriptedTurn::Live(receiver)) => Ok(decode_byte_stream(receiver)),
                None => Err(ApiError::unavailable("No scripted chat turn")),
            }
        })
    }

    fn list_conversations(&self) -> BoxFuture<'static, ApiResult<Vec<ConversationSummary>>> {
        let result = {
            let mut state = self.state.lock();
            state.record(Operation::ListConversations).map(|_| {
                let mut summaries: Vec<ConversationSummary> = state
                    .conversations
                    .values()
                    .map(ConversationDetail::summary)
                    .collect();
                summaries.sort_by_key(|s| std::cmp::Reverse(s.updated_at));
                summaries
            })
        };
        Box::pin(async move { result })
    }

    fn get_conversation(&self, id: &str) -> BoxFuture<'static, ApiResult<ConversationDetail>> {
        let state = self.state.clone();
        let id = id.to_string();
        let gate = self.state.lock().detail_gate.clone();

        Box::pin(async move {
            let result = {
                let mut state = state.lock();
                state.record(Operation::GetConversation).and_then(|_| {
                    state
                        .conversations
                        .get(&id)
                        .cloned()
                        .ok_or(ApiError::Status { status: 404 })
                })
            };
            if let Some(gate) = gate {
                // A closed gate only happens when the repository is dropped.
                let _ = gate.acquire().await;
            }
            result
        })
    }

    fn delete_conversation(&self, id: &str) -> BoxFuture<'static, ApiResult<()>> {
        let result = {
            let mut state = self.state.lock();
            state.record(Operation::DeleteConversation).map(|_| {
                state.conversations.remove(id);
            })
        };
        Box::pin(async move { result })
    }

    fn update_block_progress(
        &self,
        content_block_id: &str,
        checked_steps: Vec<bool>,
    ) -> BoxFuture<'static, ApiResult<()>> {
        let result = {
            let mut state = self.state.lock();
            state.record(Operation::UpdateBlockProgress).map(|_| {
                for message in state.conversations.values_mut().flat_map(|c| c.messages.iter_mut()) {
                    for block in message
                        .content_blocks
                        .iter_mut()
                        .filter(|b| b.id == content_block_id)
                    {
                        block.checked_steps = Some(checked_steps.clone());
                    }
                }
                state
                    .block_updates
                    .push((content_block_id.to_string(), checked_steps));
            })
        };
        Box::pin(async move { result })
    }

    fn list_plan(&self) -> BoxFuture<'static, ApiResult<Vec<PlanItem>>> {
        let result = {
            let mut state = self.state.lock();
            state
                .record(Operation::ListPlan)
                .map(|_| state.plan.clone())
        };
        Box::pin(async move { result })
    }

    fn add_plan_item(&self, item: NewPlanItem) -> BoxFuture<'static, ApiResult<PlanItem>> {
        let result = {
            let mut state = self.state.lock();
            state.record(Operation::AddPlanItem).map(|_| {
                state.next_plan_id += 1;
                let now = Utc::now();
                let mut created = PlanItem {
                    id: format!("plan-{}", state.next_plan_id),
                    content: item.content,
                    checked_steps: Vec::new(),
                    status: PlanStatus::Todo,
                    created_at: now,
                    updated_at: now,
                };
                created.normalize();
                state.plan.push(created.clone());
                created
            })
        };
        Box::pin(async move { result })
    }

    fn update_plan_progress(
        &self,
        id: &str,
        checked_steps: Vec<bool>,
    ) -> BoxFuture<'static, ApiResult<PlanItem>> {
        let result = {
            let mut state = self.state.lock();
            state.record(Operation::UpdatePlanProgress).and_then(|_| {
                state
                    .plan_updates
                    .push((id.to_string(), checked_steps.clone()));
                let item = state
                    .plan
                    .iter_mut()
                    .find(|item| item.id == id)
                    .ok_or(ApiError::Status { status: 404 })?;
                item.apply_checked(checked_steps);
                item.updated_at = Utc::now();
                Ok(item.clone())
            })
        };
        Box::pin(async move { result })
    }

    fn remove_plan_item(&self, id: &str) -> BoxFuture<'static, ApiResult<()>> {
        let result = {
            let mut state = self.state.lock();
            state.record(Operation::RemovePlanItem).map(|_| {
                state.plan.retain(|item| item.id != id);
            })
        };
        Box::pin(async move { result })
    }
}
