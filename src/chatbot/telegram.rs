//! Telegram client using teloxide.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, ChatAction};
use tracing::debug;

use crate::chatbot::engine::ChatOutput;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Publish the command list shown in Telegram's command menu.
    pub async fn register_commands(&self, commands: Vec<BotCommand>) -> Result<usize, String> {
        let count = commands.len();
        self.bot
            .set_my_commands(commands)
            .await
            .map(|_| count)
            .map_err(|e| format!("Failed to register commands: {e}"))
    }
}

#[async_trait]
impl ChatOutput for TelegramClient {
    async fn send_typing(&self, chat_id: i64) {
        if let Err(e) = self
            .bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
        {
            debug!("Failed to send typing to {chat_id}: {e}");
        }
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                debug!("{}", msg);
                msg
            })
    }
}
