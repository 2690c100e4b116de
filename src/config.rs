use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chatbot::inference::{default_inference_url, DEFAULT_MODEL};
use crate::chatbot::search::DEFAULT_SEARCH_URL;
use crate::chatbot::HistoryPolicy;

/// Config file read when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "animeboy.json";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{}': {source}", .path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    #[error("failed to parse config file '{}': {source}", .path.display())]
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Liveness address is not `host:port`.
    #[error("invalid liveness address '{addr}': {source}")]
    InvalidAddr { addr: String, source: std::net::AddrParseError },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

/// On-disk shape. Every field is optional; secrets usually come from the
/// environment instead.
#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    telegram_bot_token: String,
    #[serde(default)]
    hf_api_token: String,
    hf_model: Option<String>,
    /// Full inference URL. Defaults to the hosted endpoint for `hf_model`.
    inference_url: Option<String>,
    search_url: Option<String>,
    #[serde(default = "default_search_timeout_secs")]
    search_timeout_secs: u64,
    #[serde(default = "default_inference_timeout_secs")]
    inference_timeout_secs: u64,
    liveness_addr: Option<String>,
    bot_name: Option<String>,
    creator_name: Option<String>,
    #[serde(default)]
    history_policy: HistoryPolicy,
    /// Directory for log files. Defaults to current directory.
    data_dir: Option<String>,
}

fn default_search_timeout_secs() -> u64 {
    10
}

fn default_inference_timeout_secs() -> u64 {
    60
}

pub struct Config {
    pub telegram_bot_token: String,
    pub hf_api_token: String,
    pub hf_model: String,
    pub inference_url: String,
    pub search_url: String,
    pub search_timeout: Duration,
    pub inference_timeout: Duration,
    pub liveness_addr: SocketAddr,
    pub bot_name: String,
    pub creator_name: String,
    pub history_policy: HistoryPolicy,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
}

impl Config {
    /// Pick the config file: the CLI argument if given, else the default
    /// file when it exists.
    pub fn resolve_path(arg: Option<String>) -> Option<PathBuf> {
        match arg {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.exists().then_some(default)
            }
        }
    }

    /// Load from an optional file, with process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match path {
            Some(path) => read_file(path)?,
            None => ConfigFile::default_with_timeouts(),
        };
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let telegram_bot_token = env("TELEGRAM_BOT_TOKEN").unwrap_or(file.telegram_bot_token);
        let hf_api_token = env("HF_API_TOKEN").unwrap_or(file.hf_api_token);

        if telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token is required (or set TELEGRAM_BOT_TOKEN)".into(),
            ));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2
            || token_parts[0].parse::<u64>().is_err()
            || token_parts[1].is_empty()
        {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABC...)".into(),
            ));
        }
        if hf_api_token.is_empty() {
            return Err(ConfigError::Validation(
                "hf_api_token is required (or set HF_API_TOKEN)".into(),
            ));
        }
        if file.search_timeout_secs == 0 || file.inference_timeout_secs == 0 {
            return Err(ConfigError::Validation("timeouts must be at least one second".into()));
        }

        let hf_model = env("HF_MODEL")
            .or(file.hf_model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let inference_url = file
            .inference_url
            .unwrap_or_else(|| default_inference_url(&hf_model));

        let addr = env("LIVENESS_ADDR")
            .or(file.liveness_addr)
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let liveness_addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidAddr { addr: addr.clone(), source: e })?;

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token,
            hf_api_token,
            hf_model,
            inference_url,
            search_url: file.search_url.unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            search_timeout: Duration::from_secs(file.search_timeout_secs),
            inference_timeout: Duration::from_secs(file.inference_timeout_secs),
            liveness_addr,
            bot_name: file.bot_name.unwrap_or_else(|| "Anime Boy".to_string()),
            creator_name: file.creator_name.unwrap_or_else(|| "Aayushman".to_string()),
            history_policy: file.history_policy,
            data_dir,
        })
    }
}

impl ConfigFile {
    /// `Default` leaves the timeouts at zero; serde defaults only apply when
    /// parsing, so mirror them here.
    fn default_with_timeouts() -> Self {
        Self {
            search_timeout_secs: default_search_timeout_secs(),
            inference_timeout_secs: default_inference_timeout_secs(),
            ..Self::default()
        }
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadFile { path: path.to_path_buf(), source: e })?;
    serde_json::from_str(&content)
        .map_err(|e| ConfigError::ParseJson { path: path.to_path_buf(), source: e })
}
