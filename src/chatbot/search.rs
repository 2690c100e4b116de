//! DuckDuckGo instant-answer lookups.
//!
//! `search` never fails: every error ends up as a short placeholder the
//! model can still work with.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const DEFAULT_SEARCH_URL: &str = "https://api.duckduckgo.com/";

/// Related topic present but without text.
pub const NO_INFO: &str = "No info found.";
/// Neither an abstract nor related topics.
pub const NOTHING_FOUND: &str = "Couldn't find anything useful online.";
/// Transport, status or parse failure.
pub const QUIET_INTERNET: &str = "The internet seems quiet right now!";
/// No answer within the timeout.
pub const SEARCH_TIMED_OUT: &str = "The search took too long, so I'm answering without it.";

/// Something that can look a query up on the web.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Subset of the instant-answer payload we read.
#[derive(Deserialize, Debug, Default)]
pub struct InstantAnswer {
    #[serde(rename = "AbstractText", default)]
    pub abstract_text: Option<String>,
    #[serde(rename = "RelatedTopics", default)]
    pub related_topics: Vec<RelatedTopic>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RelatedTopic {
    #[serde(rename = "Text", default)]
    pub text: Option<String>,
}

impl InstantAnswer {
    /// Pick the best summary: abstract, then first related topic, then a
    /// fixed "nothing" message.
    pub fn summary(&self) -> String {
        if let Some(text) = self.abstract_text.as_deref()
            && !text.is_empty()
        {
            return text.to_string();
        }
        match self.related_topics.first() {
            Some(topic) => topic.text.clone().unwrap_or_else(|| NO_INFO.to_string()),
            None => NOTHING_FOUND.to_string(),
        }
    }
}

pub struct SearchClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl SearchClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            http: reqwest::Client::new(),
        }
    }

    async fn lookup(&self, query: &str) -> Result<InstantAnswer, SearchError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_redirect", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Search response status: {status}");

        if !status.is_success() {
            return Err(SearchError::Api { status, body });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn try_search(&self, query: &str) -> Result<String, SearchError> {
        let answer = tokio::time::timeout(self.timeout, self.lookup(query))
            .await
            .map_err(|_| SearchError::Timeout(self.timeout))??;
        Ok(answer.summary())
    }
}

#[async_trait]
impl WebSearch for SearchClient {
    async fn search(&self, query: &str) -> String {
        info!("🔎 Searching: {query}");
        match self.try_search(query).await {
            Ok(summary) => summary,
            Err(SearchError::Timeout(after)) => {
                warn!("Search timed out after {after:?}");
                SEARCH_TIMED_OUT.to_string()
            }
            Err(e) => {
                warn!("Search error: {e}");
                QUIET_INTERNET.to_string()
            }
        }
    }
}
