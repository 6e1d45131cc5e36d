//! Persistence of checked steps after an optimistic toggle.
//!
//! Generated cards and plan items recover from a failed save differently:
//! a generated card keeps its local state, a plan item asks the caller to
//! reload from the backend. Both sit behind [`ProgressPersistence`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::repositories::{AgentRepository, BoxFuture};

/// What the caller should do after a save attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved,
    /// The save failed; the optimistic local state stays as it is.
    KeptLocal,
    /// The save failed; local state must be replaced by the backend's.
    ReloadRequired,
}

pub trait ProgressPersistence: Send + Sync {
    fn persist_progress(
        &self,
        target_id: &str,
        checked_steps: Vec<bool>,
    ) -> BoxFuture<'static, PersistOutcome>;
}

/// Saves progress of cards generated in a chat (content blocks).
pub struct GeneratedCardProgress {
    repository: Arc<dyn AgentRepository>,
}

impl GeneratedCardProgress {
    pub fn new(repository: Arc<dyn AgentRepository>) -> Self {
        Self { repository }
    }
}

impl ProgressPersistence for GeneratedCardProgress {
    fn persist_progress(
        &self,
        target_id: &str,
        checked_steps: Vec<bool>,
    ) -> BoxFuture<'static, PersistOutcome> {
        let save = self.repository.update_block_progress(target_id, checked_steps);
        let block_id = target_id.to_string();

        Box::pin(async move {
            match save.await {
                Ok(()) => {
                    debug!(block_id = %block_id, "Card progress saved");
                    PersistOutcome::Saved
                }
                Err(e) => {
                    warn!(error = ?e, block_id = %block_id, "Failed to save card progress");
                    PersistOutcome::KeptLocal
                }
            }
        })
    }
}

/// Saves progress of plan items.
pub struct PlanItemProgress {
    repository: Arc<dyn AgentRepository>,
}

impl PlanItemProgress {
    pub fn new(repository: Arc<dyn AgentRepository>) -> Self {
        Self { repository }
    }
}

impl ProgressPersistence for PlanItemProgress {
    fn persist_progress(
        &self,
        target_id: &str,
        checked_steps: Vec<bool>,
    ) -> BoxFuture<'static, PersistOutcome> {
        let save = self.repository.update_plan_progress(target_id, checked_steps);
        let item_id = target_id.to_string();

        Box::pin(async move {
            match save.await {
                Ok(_) => PersistOutcome::Saved,
                Err(e) => {
                    warn!(error = ?e, item_id = %item_id, "Failed to save plan progress, reloading plan");
                    PersistOutcome::ReloadRequired
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{InMemoryAgentRepository, Operation};

    #[tokio::test]
    async fn test_generated_card_failure_keeps_local_state() {
        let repo = InMemoryAgentRepository::new();
        let strategy = GeneratedCardProgress::new(Arc::new(repo.clone()));

        assert_eq!(
            strategy.persist_progress("blk-1", vec![true]).await,
            PersistOutcome::Saved
        );
        assert_eq!(repo.block_updates(), vec![("blk-1".to_string(), vec![true])]);

        repo.fail(Operation::UpdateBlockProgress, 500);
        assert_eq!(
            strategy.persist_progress("blk-1", vec![false]).await,
            PersistOutcome::KeptLocal
        );
    }

    #[tokio::test]
    async fn test_plan_item_failure_requires_reload() {
        let repo = InMemoryAgentRepository::new();
        let strategy = PlanItemProgress::new(Arc::new(repo.clone()));

        // Unknown item is a 404 from the backend.
        assert_eq!(
            strategy.persist_progress("missing", vec![true]).await,
            PersistOutcome::ReloadRequired
        );
    }
}
