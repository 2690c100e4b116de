//! Message types shared by the engine and the platform adapter.

use std::fmt;

/// Opaque identity of a platform user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An inbound chat message, stripped down to what the engine needs.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Chat the reply goes back to.
    pub chat_id: i64,
    pub user_id: UserId,
    pub username: String,
    pub text: String,
    /// Sent by a bot account (including ourselves).
    pub from_bot: bool,
}

/// Max chars of message text shown in log lines.
const MAX_PREVIEW_LENGTH: usize = 100;

impl ChatMessage {
    /// Short, single-line preview of the text for logging.
    pub fn preview(&self) -> String {
        let mut preview: String = self
            .text
            .chars()
            .take(MAX_PREVIEW_LENGTH)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        if self.text.chars().count() > MAX_PREVIEW_LENGTH {
            preview.push_str("...");
        }
        preview
    }
}
