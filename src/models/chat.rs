use chrono::Utc;
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use super::query::QueryResult;

pub const GREETING: &str = "What question do you need assistance answering?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: i64,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            request_id: None,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn assistant(content: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            request_id,
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// What the presentation layer gets back from one processing cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub turn: Turn,
    pub suggestions: Vec<String>,
    pub sql: Option<String>,
    pub results: Option<QueryResult>,
    pub query_error: Option<String>,
}

/// Clickable alternatives from the latest analyst reply, plus the one-shot
/// slot a click fills for replay on the next cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SuggestionTracker {
    offered: Vec<String>,
    active: Option<String>,
}

impl SuggestionTracker {
    pub fn offer(&mut self, options: Vec<String>) {
        self.offered = options;
    }

    pub fn offered(&self) -> &[String] {
        &self.offered
    }

    pub fn select(&mut self, option: impl Into<String>) {
        self.active = Some(option.into());
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Empties the slot; callers must not put the value back.
    pub fn take(&mut self) -> Option<String> {
        self.active.take()
    }

    fn reset(&mut self) {
        self.offered.clear();
        self.active = None;
    }
}

/// One conversation session: an append-only turn log and the suggestion slot.
///
/// Only the processing cycle mutates it, and only one cycle runs at a time.
#[derive(Clone, Debug)]
pub struct ConversationContext {
    id: String,
    turns: Vec<Turn>,
    suggestions: SuggestionTracker,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            turns: vec![Turn::assistant(GREETING, None)],
            suggestions: SuggestionTracker::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn suggestions(&self) -> &SuggestionTracker {
        &self.suggestions
    }

    pub fn suggestions_mut(&mut self) -> &mut SuggestionTracker {
        &mut self.suggestions
    }

    /// Records a suggestion click. Nothing is appended until the next cycle.
    pub fn select_suggestion(&mut self, option: impl Into<String>) {
        self.suggestions.select(option);
    }

    /// Truncates back to the seeded greeting.
    pub fn clear(&mut self) {
        self.turns = vec![Turn::assistant(GREETING, None)];
        self.suggestions.reset();
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new()
    }
}
