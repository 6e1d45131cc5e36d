use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::auth::AuthService;
use crate::models::card::CardContent;
use crate::models::card_progress::{ProgressError, toggled_steps};
use crate::models::plan::{NewPlanItem, PlanColumns, PlanItem};
use crate::repositories::{AgentRepository, ApiResult};
use crate::services::progress_service::{PersistOutcome, PlanItemProgress, ProgressPersistence};

/// Client-side cache of the user's training plan.
///
/// The backend owns plan items. Local edits are applied first and, when the
/// backend rejects them, replaced by a fresh copy of the plan.
#[derive(Clone)]
pub struct PlanController {
    repository: Arc<dyn AgentRepository>,
    auth: Arc<dyn AuthService>,
    progress: Arc<dyn ProgressPersistence>,
    items: Arc<Mutex<Vec<PlanItem>>>,
}

impl PlanController {
    pub fn new(repository: Arc<dyn AgentRepository>, auth: Arc<dyn AuthService>) -> Self {
        let progress = Arc::new(PlanItemProgress::new(repository.clone()));
        Self {
            repository,
            auth,
            progress,
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn items(&self) -> Vec<PlanItem> {
        self.items.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<PlanItem> {
        self.items.lock().iter().find(|item| item.id == id).cloned()
    }

    pub fn board(&self) -> PlanColumns {
        PlanColumns::group(&self.items.lock())
    }

    /// Fetch the plan. Returns false when signed out or when the fetch failed
    /// (the cached items stay as they were).
    pub async fn load(&self) -> bool {
        if !self.auth.is_authenticated() {
            debug!("Not signed in, skipping plan load");
            return false;
        }
        match self.repository.list_plan().await {
            Ok(mut items) => {
                items.iter_mut().for_each(PlanItem::normalize);
                debug!(count = items.len(), "Plan loaded");
                *self.items.lock() = items;
                true
            }
            Err(e) => {
                warn!(error = ?e, "Failed to load plan");
                false
            }
        }
    }

    /// Add a generated or catalog card to the plan.
    pub async fn add_card(&self, content: CardContent) -> ApiResult<PlanItem> {
        let title = content.title.clone();
        let mut created = self
            .repository
            .add_plan_item(NewPlanItem::from(content))
            .await?;
        created.normalize();
        info!(item_id = %created.id, title = %title, "Card added to plan");
        self.items.lock().push(created.clone());
        Ok(created)
    }

    /// Flip one step, then save. A failed save reloads the whole plan.
    pub async fn toggle_step(
        &self,
        id: &str,
        step_index: usize,
    ) -> Result<PersistOutcome, ProgressError> {
        let checked = {
            let mut items = self.items.lock();
            let item = items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or(ProgressError::PlanItemNotFound)?;
            let checked = toggled_steps(
                Some(item.checked_steps.as_slice()),
                item.content.steps.len(),
                step_index,
            )?;
            item.apply_checked(checked.clone());
            checked
        };

        let outcome = self.progress.persist_progress(id, checked).await;
        if outcome == PersistOutcome::ReloadRequired {
            self.load().await;
        }
        Ok(outcome)
    }

    /// Remove an item locally, then on the backend. A failed delete reloads
    /// the plan so the item reappears.
    pub async fn remove(&self, id: &str) -> bool {
        self.items.lock().retain(|item| item.id != id);
        match self.repository.remove_plan_item(id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = ?e, item_id = %id, "Failed to remove plan item, reloading plan");
                self.load().await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::PlanStatus;
    use crate::repositories::{InMemoryAgentRepository, Operation};
    use crate::test_helpers::RecordingAuth;

    fn card(title: &str, steps: usize) -> CardContent {
        CardContent {
            title: title.to_string(),
            steps: (0..steps).map(|i| format!("step {i}")).collect(),
            ..Default::default()
        }
    }

    fn controller(repo: &InMemoryAgentRepository, signed_in: bool) -> PlanController {
        PlanController::new(
            Arc::new(repo.clone()),
            Arc::new(RecordingAuth::new(signed_in)),
        )
    }

    #[tokio::test]
    async fn test_load_requires_sign_in() {
        let repo = InMemoryAgentRepository::new();
        let plan = controller(&repo, false);
        assert!(!plan.load().await);
        assert_eq!(repo.calls(Operation::ListPlan), 0);
    }

    #[tokio::test]
    async fn test_add_and_toggle_moves_across_board() {
        let repo = InMemoryAgentRepository::new();
        let plan = controller(&repo, true);
        let item = plan.add_card(card("Serve", 2)).await.unwrap();
        assert_eq!(plan.board().todo.len(), 1);

        plan.toggle_step(&item.id, 0).await.unwrap();
        assert_eq!(plan.get(&item.id).unwrap().status, PlanStatus::InProgress);
        assert_eq!(plan.board().in_progress.len(), 1);

        plan.toggle_step(&item.id, 1).await.unwrap();
        assert_eq!(plan.board().complete.len(), 1);
        assert_eq!(
            repo.plan_items()[0].checked_steps,
            vec![true, true]
        );
    }

    #[tokio::test]
    async fn test_failed_toggle_rolls_back_by_refetch() {
        let repo = InMemoryAgentRepository::new();
        let plan = controller(&repo, true);
        let item = plan.add_card(card("Footwork", 2)).await.unwrap();

        repo.fail(Operation::UpdatePlanProgress, 500);
        let outcome = plan.toggle_step(&item.id, 0).await.unwrap();
        assert_eq!(outcome, PersistOutcome::ReloadRequired);
        assert_eq!(plan.get(&item.id).unwrap().checked_steps, vec![false, false]);
        assert_eq!(repo.calls(Operation::ListPlan), 1);
    }

    #[tokio::test]
    async fn test_toggle_validates_target() {
        let repo = InMemoryAgentRepository::new();
        let plan = controller(&repo, true);
        let item = plan.add_card(card("Volley", 1)).await.unwrap();
        assert_eq!(
            plan.toggle_step("nope", 0).await,
            Err(ProgressError::PlanItemNotFound)
        );
        assert!(matches!(
            plan.toggle_step(&item.id, 1).await,
            Err(ProgressError::StepOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_remove_restores_item() {
        let repo = InMemoryAgentRepository::new();
        let plan = controller(&repo, true);
        let item = plan.add_card(card("Slice", 1)).await.unwrap();

        repo.fail(Operation::RemovePlanItem, 500);
        assert!(!plan.remove(&item.id).await);
        assert!(plan.get(&item.id).is_some());

        repo.recover(Operation::RemovePlanItem);
        assert!(plan.remove(&item.id).await);
        assert!(plan.items().is_empty());
    }
}
