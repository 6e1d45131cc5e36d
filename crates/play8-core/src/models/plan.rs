use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::card::{CardContent, StepProgress, normalize_checked};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Todo,
    InProgress,
    Complete,
}

impl PlanStatus {
    /// Status is a pure function of the checked steps.
    pub fn from_checked(checked: &[bool], step_count: usize) -> Self {
        let progress = StepProgress::from_checked(Some(checked), step_count);
        if progress.is_complete() {
            PlanStatus::Complete
        } else if progress.is_started() {
            PlanStatus::InProgress
        } else {
            PlanStatus::Todo
        }
    }
}

/// An entry of the user's persisted training plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: String,
    #[serde(flatten)]
    pub content: CardContent,
    #[serde(default)]
    pub checked_steps: Vec<bool>,
    #[serde(default)]
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlanItem {
    /// Bring `checked_steps` in line with `steps` and recompute the status.
    pub fn normalize(&mut self) {
        let step_count = self.content.steps.len();
        self.checked_steps = normalize_checked(Some(self.checked_steps.as_slice()), step_count);
        self.status = PlanStatus::from_checked(&self.checked_steps, step_count);
    }

    pub fn apply_checked(&mut self, checked: Vec<bool>) {
        self.checked_steps = checked;
        self.normalize();
    }

    pub fn progress(&self) -> StepProgress {
        StepProgress::from_checked(Some(self.checked_steps.as_slice()), self.content.steps.len())
    }
}

/// Request body for adding a card to the plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewPlanItem {
    #[serde(flatten)]
    pub content: CardContent,
}

impl From<CardContent> for NewPlanItem {
    fn from(content: CardContent) -> Self {
        Self { content }
    }
}

/// Plan items grouped into board columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanColumns {
    pub todo: Vec<PlanItem>,
    pub in_progress: Vec<PlanItem>,
    pub complete: Vec<PlanItem>,
}

impl PlanColumns {
    pub fn group(items: &[PlanItem]) -> Self {
        let mut columns = PlanColumns::default();
        for item in items {
            let bucket = match item.status {
                PlanStatus::Todo => &mut columns.todo,
                PlanStatus::InProgress => &mut columns.in_progress,
                PlanStatus::Complete => &mut columns.complete,
            };
            bucket.push(item.clone());
        }
        columns
    }
}
