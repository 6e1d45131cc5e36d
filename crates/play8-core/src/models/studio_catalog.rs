use serde::Deserialize;

use super::card::{CardCategory, CardContent};

const BUILTIN_CARDS: &str = include_str!("../../assets/studio_cards.json");

/// Maximum number of catalog cards suggested for a conversation.
pub const CONTEXTUAL_LIMIT: usize = 3;

/// A hand-written training card shipped with the client.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StudioCard {
    pub id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(flatten)]
    pub content: CardContent,
}

impl StudioCard {
    /// Number of keywords that occur in `lowercase_text`.
    fn score(&self, lowercase_text: &str) -> usize {
        self.keywords
            .iter()
            .filter(|keyword| lowercase_text.contains(&keyword.to_lowercase()))
            .count()
    }
}

#[derive(Clone, Debug, Default)]
pub struct StudioCatalog {
    cards: Vec<StudioCard>,
}

impl StudioCatalog {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let cards = serde_json::from_str(json)?;
        Ok(Self { cards })
    }

    /// The catalog embedded in the binary.
    pub fn builtin() -> Result<Self, serde_json::Error> {
        Self::from_json(BUILTIN_CARDS)
    }

    pub fn cards(&self) -> &[StudioCard] {
        &self.cards
    }

    pub fn get(&self, id: &str) -> Option<&StudioCard> {
        self.cards.iter().find(|card| card.id == id)
    }

    /// Cards relevant to what has been said so far, best match first.
    ///
    /// Ties keep catalog order. Cards matching no keyword are never returned.
    pub fn contextual_matches(&self, conversation_text: &str) -> Vec<&StudioCard> {
        if conversation_text.is_empty() {
            return Vec::new();
        }
        let lowered = conversation_text.to_lowercase();
        let mut scored: Vec<(usize, &StudioCard)> = self
            .cards
            .iter()
            .map(|card| (card.score(&lowered), card))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(CONTEXTUAL_LIMIT)
            .map(|(_, card)| card)
            .collect()
    }

    /// Cards grouped under their category, in display order.
    pub fn by_category(&self) -> Vec<(CardCategory, Vec<&StudioCard>)> {
        [
            CardCategory::Training,
            CardCategory::Technique,
            CardCategory::BallMachine,
        ]
        .into_iter()
        .map(|category| {
            let cards = self
                .cards
                .iter()
                .filter(|card| card.content.category == category)
                .collect();
            (category, cards)
        })
        .collect()
    }
}
