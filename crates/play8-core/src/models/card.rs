use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardCategory {
    #[default]
    Training,
    Technique,
    BallMachine,
}

impl CardCategory {
    /// Lenient parse used for generated content: unknown values fall back to `Training`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim() {
            "technique" => CardCategory::Technique,
            "ball-machine" => CardCategory::BallMachine,
            _ => CardCategory::Training,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CardCategory::Training => "Training Plans",
            CardCategory::Technique => "Techniques",
            CardCategory::BallMachine => "Ball Machine",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "beginner" => Some(Difficulty::Beginner),
            "intermediate" => Some(Difficulty::Intermediate),
            "advanced" => Some(Difficulty::Advanced),
            _ => None,
        }
    }
}

/// Which part of a card the generator is currently writing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamingSection {
    Overview,
    Steps,
    Tips,
}

/// Session-local handle for a card. Stable while the card list grows and
/// placeholders are replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CardId(pub(crate) u64);

/// The training content every card carries, generated or catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardContent {
    pub title: String,
    pub description: String,
    pub category: CardCategory,
    pub difficulty: Option<Difficulty>,
    pub duration: Option<String>,
    pub overview: String,
    pub steps: Vec<String>,
    pub tips: Vec<String>,
}

/// A card produced by the coach during a chat turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub content: CardContent,
    pub is_streaming: bool,
    pub streaming_section: Option<StreamingSection>,
    pub content_block_id: Option<String>,
    pub checked_steps: Option<Vec<bool>>,
}

impl Card {
    pub(crate) fn placeholder(id: CardId) -> Self {
        Self {
            id,
            content: CardContent::default(),
            is_streaming: true,
            streaming_section: None,
            content_block_id: None,
            checked_steps: None,
        }
    }

    pub(crate) fn completed(id: CardId, content: CardContent) -> Self {
        Self {
            id,
            content,
            is_streaming: false,
            streaming_section: None,
            content_block_id: None,
            checked_steps: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.content.title
    }

    pub fn steps(&self) -> &[String] {
        &self.content.steps
    }

    pub fn progress(&self) -> StepProgress {
        StepProgress::from_checked(self.checked_steps.as_deref(), self.content.steps.len())
    }
}

/// Checked / total step counts for a card or plan item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepProgress {
    pub checked: usize,
    pub total: usize,
}

impl StepProgress {
    pub fn from_checked(checked: Option<&[bool]>, total: usize) -> Self {
        let checked = checked
            .unwrap_or_default()
            .iter()
            .take(total)
            .filter(|done| **done)
            .count();
        Self { checked, total }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.checked == self.total
    }

    pub fn is_started(&self) -> bool {
        self.checked > 0
    }

    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.checked as f32 / self.total as f32
        }
    }
}

/// Resize a checked-steps array to `len`, treating missing entries as unchecked.
pub fn normalize_checked(checked: Option<&[bool]>, len: usize) -> Vec<bool> {
    let mut normalized = checked.map(|c| c.to_vec()).unwrap_or_default();
    normalized.resize(len, false);
    normalized
}
