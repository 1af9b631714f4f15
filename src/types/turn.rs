//! Conversation history sent to the remote engine
//!
//! - Turn = one message (user action or adopted assistant decision)
//! - History = the last 6 turns, oldest evicted first

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::HISTORY_CAPACITY;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// How the user changed the observation set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Option picked (observation added)
    Selected,
    /// Trait retracted (observation removed)
    Removed,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Selected => "selected",
            ActionKind::Removed => "removed",
        }
    }
}

/// A single chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    /// Create a turn
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// User action annotation, e.g. `User selected: Glassy`
    pub fn user_action(kind: ActionKind, subject: &str) -> Self {
        Self::new(TurnRole::User, format!("User {}: {}", kind.as_str(), subject))
    }

    /// Assistant turn carrying an adopted decision
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }
}

/// Bounded conversation history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    turns: VecDeque<Turn>,
}

impl History {
    /// Create empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, evicting the oldest beyond capacity
    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > HISTORY_CAPACITY {
            self.turns.pop_front();
        }
    }

    /// Get all turns (oldest first)
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Copy out for a request body
    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Get turn count
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }
}
