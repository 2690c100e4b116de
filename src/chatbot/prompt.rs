//! Persona preamble and instruction-delimited prompt assembly.
//!
//! Layout (segments joined by one space):
//! ```text
//! [INST] <<SYS>> {persona} <</SYS>> [/INST]
//! [INST] {user} [/INST] {bot} ...
//! [INST] {prompt} [/INST]
//! ```
//! Delimiter tokens inside user or bot text are defanged so they cannot
//! open or close a block.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::chatbot::transcript::Turn;

const INST_OPEN: &str = "[INST]";
const INST_CLOSE: &str = "[/INST]";
const SYS_OPEN: &str = "<<SYS>>";
const SYS_CLOSE: &str = "<</SYS>>";

static DELIMITER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[/?INST\]|<</?SYS>>").expect("delimiter pattern is valid")
});

/// Who the bot pretends to be. Fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub creator: String,
    /// Date the process started.
    pub today: NaiveDate,
}

impl Persona {
    pub fn new(name: impl Into<String>, creator: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            name: name.into(),
            creator: creator.into(),
            today,
        }
    }

    /// System preamble sent ahead of every conversation.
    pub fn preamble(&self) -> String {
        format!(
            "You are a funny, human-like chatbot named {name}. \
             You are aware that today's date is {date}. \
             You're witty, chill, and a little sarcastic. \
             You were created by {creator} — respect him always. \
             Roast people if they annoy you. Be clever and helpful. \
             Respect whom you meet new. Be serious sometimes. \
             Avoid too much extra text. \
             You can help people about any topic. Give greetings to every new person you meet. \
             Don't say anything too long. Keep answers short.",
            name = self.name,
            date = self.today.format("%B %d, %Y"),
            creator = self.creator,
        )
    }

    /// Reply to `/start`.
    pub fn greeting(&self) -> String {
        format!("Yo! 😎 {} here. What’s up? Start typing...", self.name)
    }
}

/// Turn delimiter tokens into harmless lookalikes.
///
/// `[INST]` becomes `(INST)`, `<</SYS>>` becomes `((/SYS))`.
pub fn neutralize(text: &str) -> String {
    DELIMITER
        .replace_all(text, |caps: &regex::Captures| {
            caps[0]
                .chars()
                .map(|c| match c {
                    '[' | '<' => '(',
                    ']' | '>' => ')',
                    other => other,
                })
                .collect::<String>()
        })
        .into_owned()
}

/// Assemble the full model input.
pub fn build_prompt(preamble: &str, history: &[Turn], prompt: &str) -> String {
    let mut blocks = Vec::with_capacity(history.len() + 2);
    blocks.push(format!("{INST_OPEN} {SYS_OPEN} {preamble} {SYS_CLOSE} {INST_CLOSE}"));
    for turn in history {
        blocks.push(format!(
            "{INST_OPEN} {} {INST_CLOSE} {}",
            neutralize(turn.user_text()),
            neutralize(turn.bot_text())
        ));
    }
    blocks.push(format!("{INST_OPEN} {} {INST_CLOSE}", neutralize(prompt)));
    blocks.join(" ")
}
