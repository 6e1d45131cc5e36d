//! Converts the JSON result of the card-generating tool into card content.
//!
//! The payload comes from a separate generation step, so every field is
//! optional and bad input degrades to fewer cards instead of an error.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::models::card::{CardCategory, CardContent, Difficulty};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawToolCard {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    content: Option<RawCardBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCardBody {
    difficulty: Option<String>,
    duration: Option<String>,
    overview: Option<String>,
    steps: Option<Vec<String>>,
    tips: Option<Vec<String>>,
}

impl From<RawToolCard> for CardContent {
    fn from(raw: RawToolCard) -> Self {
        let body = raw.content.unwrap_or_default();
        CardContent {
            title: raw.title.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            category: raw
                .category
                .as_deref()
                .map(CardCategory::parse_lenient)
                .unwrap_or_default(),
            difficulty: body.difficulty.as_deref().and_then(Difficulty::parse),
            duration: body.duration,
            overview: body.overview.unwrap_or_default(),
            steps: body.steps.unwrap_or_default(),
            tips: body.tips.unwrap_or_default(),
        }
    }
}

/// Parse a tool result into zero or more cards. Never fails.
pub fn parse_tool_result(result: &str) -> Vec<CardContent> {
    let value: Value = match serde_json::from_str(result) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Tool result is not valid JSON");
            return Vec::new();
        }
    };

    let Value::Array(entries) = value else {
        debug!("Tool result is not an array");
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RawToolCard>(entry) {
            Ok(raw) => Some(CardContent::from(raw)),
            Err(e) => {
                debug!(error = %e, "Skipping malformed card in tool result");
                None
            }
        })
        .collect()
}

/// Titles of the cards contained in a tool result, in order.
pub fn parse_card_titles(result: &str) -> Vec<String> {
    parse_tool_result(result)
        .into_iter()
        .map(|card| card.title)
        .collect()
}
