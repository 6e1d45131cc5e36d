use thiserror::Error;

use super::card::normalize_checked;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("Card not found")]
    CardNotFound,

    #[error("Step {index} is out of range for a card with {step_count} steps")]
    StepOutOfRange { index: usize, step_count: usize },

    #[error("Plan item not found")]
    PlanItemNotFound,
}

/// Flip step `index` of a checked-steps array sized to `step_count`.
///
/// Missing entries count as unchecked. The result always has exactly
/// `step_count` entries.
pub fn toggled_steps(
    checked: Option<&[bool]>,
    step_count: usize,
    index: usize,
) -> Result<Vec<bool>, ProgressError> {
    if index >= step_count {
        return Err(ProgressError::StepOutOfRange { index, step_count });
    }
    let mut next = normalize_checked(checked, step_count);
    next[index] = !next[index];
    Ok(next)
}
