//! Hosted text-generation client (Hugging Face inference API).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chatbot::prompt::{build_prompt, Persona};
use crate::chatbot::transcript::Turn;

pub const DEFAULT_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.3";
const INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co/models";

/// Any failure talking to the model.
pub const BRAIN_SHORT_CIRCUITED: &str = "Oops! My brain short-circuited. Try again.";
/// No answer within the timeout.
pub const INFERENCE_TIMED_OUT: &str = "I zoned out for too long there. Try again.";

const MAX_NEW_TOKENS: u32 = 200;
const TEMPERATURE: f64 = 0.9;
const TOP_P: f64 = 0.95;

pub fn default_inference_url(model: &str) -> String {
    format!("{INFERENCE_BASE_URL}/{model}")
}

/// Something that continues a conversation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, history: &[Turn]) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("empty generation")]
    Empty,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Serialize, Debug)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Serialize, Debug)]
struct GenerationParameters {
    max_new_tokens: u32,
    temperature: f64,
    top_p: f64,
    do_sample: bool,
    return_full_text: bool,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: MAX_NEW_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            do_sample: true,
            return_full_text: false,
        }
    }
}

#[derive(Deserialize, Debug)]
struct Generation {
    generated_text: String,
}

pub struct InferenceClient {
    url: String,
    api_token: String,
    persona: Persona,
    timeout: Duration,
    http: reqwest::Client,
}

impl InferenceClient {
    pub fn new(
        url: impl Into<String>,
        api_token: impl Into<String>,
        persona: Persona,
        timeout: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            api_token: api_token.into(),
            persona,
            timeout,
            http: reqwest::Client::new(),
        }
    }

    async fn request(&self, inputs: &str) -> Result<String, InferenceError> {
        let request = GenerateRequest {
            inputs,
            parameters: GenerationParameters::default(),
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Inference response status: {status}");

        if !status.is_success() {
            return Err(InferenceError::Api { status, body });
        }

        let generations: Vec<Generation> = serde_json::from_str(&body)?;
        let text = generations
            .into_iter()
            .next()
            .map(|g| g.generated_text.trim().to_string())
            .ok_or(InferenceError::Empty)?;

        if text.is_empty() {
            return Err(InferenceError::Empty);
        }
        Ok(text)
    }

    async fn try_generate(&self, prompt: &str, history: &[Turn]) -> Result<String, InferenceError> {
        let inputs = build_prompt(&self.persona.preamble(), history, prompt);
        tokio::time::timeout(self.timeout, self.request(&inputs))
            .await
            .map_err(|_| InferenceError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl TextGenerator for InferenceClient {
    async fn generate(&self, prompt: &str, history: &[Turn]) -> String {
        match self.try_generate(prompt, history).await {
            Ok(text) => {
                info!("🧠 Generated {} chars ({} turns of history)", text.len(), history.len());
                text
            }
            Err(InferenceError::Timeout(after)) => {
                warn!("Inference timed out after {after:?}");
                INFERENCE_TIMED_OUT.to_string()
            }
            Err(e) => {
                warn!("Inference error: {e}");
                BRAIN_SHORT_CIRCUITED.to_string()
            }
        }
    }
}
