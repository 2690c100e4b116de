//! Per-user conversation transcripts.
//!
//! Pure in-memory data. The engine owns the store behind a mutex and hands
//! snapshots of the turns to the prompt builder.

use std::collections::HashMap;

use crate::chatbot::message::UserId;

/// One exchange: what the user said and what the bot answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    user_text: String,
    bot_text: String,
}

impl Turn {
    pub fn new(user_text: impl Into<String>, bot_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            bot_text: bot_text.into(),
        }
    }

    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    pub fn bot_text(&self) -> &str {
        &self.bot_text
    }
}

/// Ordered turns for one user, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }
}

/// All transcripts, keyed by user.
#[derive(Debug, Default)]
pub struct TranscriptStore {
    transcripts: HashMap<UserId, Transcript>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the user's transcript, registering an empty one on first access.
    pub fn get_or_create(&mut self, user_id: &UserId) -> &Transcript {
        self.transcripts.entry(user_id.clone()).or_default()
    }

    pub fn get(&self, user_id: &UserId) -> Option<&Transcript> {
        self.transcripts.get(user_id)
    }

    /// Append a turn. Creates the transcript if needed.
    pub fn append(&mut self, user_id: &UserId, turn: Turn) {
        self.transcripts
            .entry(user_id.clone())
            .or_default()
            .push(turn);
    }

    /// Replace the user's transcript with an empty one.
    pub fn reset(&mut self, user_id: &UserId) {
        self.transcripts
            .insert(user_id.clone(), Transcript::default());
    }
}
