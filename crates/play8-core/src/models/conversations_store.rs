use chrono::{DateTime, Utc};

use super::conversation::ConversationSummary;

/// Client-side list of the user's conversations, most recent first.
#[derive(Debug, Default)]
pub struct ConversationsStore {
    conversations: Vec<ConversationSummary>,
}

impl ConversationsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list with what the backend returned.
    pub fn set_all(&mut self, mut conversations: Vec<ConversationSummary>) {
        conversations.sort_by_key(|c| std::cmp::Reverse(c.updated_at));
        self.conversations = conversations;
    }

    /// Insert an untitled entry at the top unless `id` is already listed.
    /// Returns true when an entry was added.
    pub fn ensure(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        if self.contains(id) {
            return false;
        }
        self.conversations
            .insert(0, ConversationSummary::new(id, None, now));
        true
    }

    /// Record the title the backend assigned when a turn finished.
    ///
    /// Inserts the entry when absent, otherwise replaces its title.
    pub fn upsert_from_done(&mut self, id: &str, title: &str, now: DateTime<Utc>) {
        match self.conversations.iter_mut().find(|c| c.id == id) {
            Some(existing) => {
                existing.title = Some(title.to_string());
                existing.updated_at = now;
            }
            None => self.conversations.insert(
                0,
                ConversationSummary::new(id, Some(title.to_string()), now),
            ),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<ConversationSummary> {
        let pos = self.conversations.iter().position(|c| c.id == id)?;
        Some(self.conversations.remove(pos))
    }

    pub fn get(&self, id: &str) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn list(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn count(&self) -> usize {
        self.conversations.len()
    }

}
