//! Conversation history passed through to context builders.

use serde::{Deserialize, Serialize};
use tariff_llm::ChatRole;

use crate::context::escape_cell;

/// One prior turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Ordered prior turns, oldest first.
///
/// The orchestrator never stores or mutates history; it hands it to the
/// context builder as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_turn(&mut self, role: ChatRole, content: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role,
            content: content.into(),
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render the most recent `max_turns` turns as a context table.
    /// Returns an empty string when there is nothing to render.
    pub fn to_context_text(&self, max_turns: usize) -> String {
        if self.turns.is_empty() || max_turns == 0 {
            return String::new();
        }

        let skip = self.turns.len().saturating_sub(max_turns);
        let mut text = String::from("-----Conversation History-----\nturn|role|content\n");
        for (i, turn) in self.turns.iter().enumerate().skip(skip) {
            text.push_str(&format!(
                "{}|{}|{}\n",
                i + 1,
                turn.role.as_str(),
                escape_cell(&turn.content)
            ));
        }
        text
    }
}

impl FromIterator<ConversationTurn> for ConversationHistory {
    fn from_iter<I: IntoIterator<Item = ConversationTurn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}
