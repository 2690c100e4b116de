//! Chatbot engine - routes messages between the chat, web search and the
//! language model.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chatbot::active::ActiveUsers;
use crate::chatbot::inference::TextGenerator;
use crate::chatbot::message::{ChatMessage, UserId};
use crate::chatbot::prompt::Persona;
use crate::chatbot::search::WebSearch;
use crate::chatbot::transcript::{Transcript, TranscriptStore, Turn};
use crate::chatbot::user_lock::UserLocks;

/// Reply to `/reset`.
pub const RESET_CONFIRMATION: &str = "🧹 My brain has been wiped. Let's start fresh!";

static SEARCH_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(who|what|when|where|how|why|news|search|latest)\b")
        .expect("search trigger pattern is valid")
});

/// True if the message asks something worth looking up.
pub fn needs_search(text: &str) -> bool {
    SEARCH_TRIGGER.is_match(text)
}

/// Append a search result to the text sent for generation.
pub fn annotate_with_search(text: &str, result: &str) -> String {
    format!("{text}\n\nHere’s some info I found online: {result}")
}

/// Where replies go.
#[async_trait]
pub trait ChatOutput: Send + Sync {
    async fn send_typing(&self, chat_id: i64);
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String>;
}

/// Which user text is stored in the transcript when a search ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryPolicy {
    /// Store the text that was sent for generation, search annotation included.
    #[default]
    Annotated,
    /// Store only what the user typed.
    Raw,
}

/// Chatbot configuration.
#[derive(Debug, Clone)]
pub struct ChatbotConfig {
    pub persona: Persona,
    pub history_policy: HistoryPolicy,
}

/// The chatbot engine.
pub struct ChatbotEngine {
    config: ChatbotConfig,
    transcripts: Mutex<TranscriptStore>,
    active_users: Mutex<ActiveUsers>,
    user_locks: UserLocks,
    search: Arc<dyn WebSearch>,
    generator: Arc<dyn TextGenerator>,
    output: Arc<dyn ChatOutput>,
}

impl ChatbotEngine {
    pub fn new(
        config: ChatbotConfig,
        search: Arc<dyn WebSearch>,
        generator: Arc<dyn TextGenerator>,
        output: Arc<dyn ChatOutput>,
    ) -> Self {
        Self {
            config,
            transcripts: Mutex::new(TranscriptStore::new()),
            active_users: Mutex::new(ActiveUsers::new()),
            user_locks: UserLocks::new(),
            search,
            generator,
            output,
        }
    }

    /// `/start`: opt the user in and greet them.
    pub async fn handle_start(&self, chat_id: i64, user_id: &UserId) {
        let newly_active = self.active_users.lock().await.activate(user_id);
        self.transcripts.lock().await.get_or_create(user_id);

        if newly_active {
            info!("👋 User {user_id} opted in");
        } else {
            debug!("User {user_id} was already active");
        }
        self.send(chat_id, &self.config.persona.greeting()).await;
    }

    /// `/reset`: wipe the user's transcript, active or not.
    ///
    /// Waits for any reply still being generated for the same user.
    pub async fn handle_reset(&self, chat_id: i64, user_id: &UserId) {
        {
            let _guard = self.user_locks.acquire(user_id).await;
            self.transcripts.lock().await.reset(user_id);
        }
        info!("🧹 Reset transcript for {user_id}");
        self.send(chat_id, RESET_CONFIRMATION).await;
    }

    /// Handle a plain text message.
    pub async fn handle_message(&self, msg: ChatMessage) {
        if msg.from_bot {
            debug!("Ignoring bot message from {}", msg.username);
            return;
        }
        if !self.is_active(&msg.user_id).await {
            debug!("Ignoring message from inactive user {}", msg.user_id);
            return;
        }

        let _guard = self.user_locks.acquire(&msg.user_id).await;
        info!("📨 {} ({}): \"{}\"", msg.username, msg.user_id, msg.preview());
        self.output.send_typing(msg.chat_id).await;

        let input = if needs_search(&msg.text) {
            let result = self.search.search(&msg.text).await;
            annotate_with_search(&msg.text, &result)
        } else {
            msg.text.clone()
        };

        let history = self
            .transcripts
            .lock()
            .await
            .get_or_create(&msg.user_id)
            .turns()
            .to_vec();
        let reply = self.generator.generate(&input, &history).await;

        let stored = match self.config.history_policy {
            HistoryPolicy::Annotated => input,
            HistoryPolicy::Raw => msg.text,
        };
        self.transcripts
            .lock()
            .await
            .append(&msg.user_id, Turn::new(stored, reply.clone()));

        self.send(msg.chat_id, &reply).await;
    }

    pub async fn is_active(&self, user_id: &UserId) -> bool {
        self.active_users.lock().await.is_active(user_id)
    }

    /// Snapshot of a user's transcript, if one exists.
    pub async fn transcript(&self, user_id: &UserId) -> Option<Transcript> {
        self.transcripts.lock().await.get(user_id).cloned()
    }

    async fn send(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.output.send_message(chat_id, text).await {
            warn!("Reply to chat {chat_id} dropped: {e}");
        }
    }
}
