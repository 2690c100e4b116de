//! Chatbot module - relays Telegram messages to a hosted language model.

pub mod active;
pub mod engine;
pub mod inference;
pub mod message;
pub mod prompt;
pub mod search;
pub mod telegram;
pub mod transcript;
pub mod user_lock;

#[cfg(test)]
mod tests;

pub use engine::{ChatOutput, ChatbotConfig, ChatbotEngine, HistoryPolicy};
pub use inference::{InferenceClient, TextGenerator};
pub use message::{ChatMessage, UserId};
pub use prompt::Persona;
pub use search::{SearchClient, WebSearch};
pub use telegram::TelegramClient;
pub use transcript::{Transcript, TranscriptStore, Turn};
