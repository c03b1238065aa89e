//! Fallback country inference for ports the static table does not know.
//!
//! The production client talks to an OpenAI-compatible chat-completion
//! endpoint and expects a JSON array of `{key, count, country}` back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::CountryServiceConfig;
use crate::entity::{AggregatedRow, CountryRow};

const SYSTEM_PROMPT: &str = "You map shipping port names to the country they are located in. \
Each input row has a `key` (a port name, possibly several aliases separated by ';') and a `count`. \
Reply with ONLY a JSON array containing one object per input row: \
{\"key\": <unchanged key>, \"count\": <unchanged count>, \"country\": <English country name or null>}.";

#[derive(Debug, Error)]
pub enum CountryServiceError {
    #[error("Country service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Country service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Country service reply could not be parsed: {0}")]
    MalformedReply(String),

    #[error("API key environment variable '{0}' is not set")]
    MissingApiKey(String),
}

/// Batch country inference. Called at most once per entity.
#[async_trait]
pub trait CountryService: Send + Sync {
    async fn resolve_countries(
        &self,
        rows: &[AggregatedRow],
    ) -> Result<Vec<CountryRow>, CountryServiceError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyRow {
    key: String,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WrappedReply {
    rows: Vec<ReplyRow>,
}

/// Chat-completion backed country service.
#[derive(Debug, Clone)]
pub struct ChatCountryService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatCountryService {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CountryServiceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        })
    }

    /// Build from config, reading the API key from the configured environment variable.
    pub fn from_config(config: &CountryServiceConfig) -> Result<Self, CountryServiceError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CountryServiceError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            Some(api_key),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl CountryService for ChatCountryService {
    async fn resolve_countries(
        &self,
        rows: &[AggregatedRow],
    ) -> Result<Vec<CountryRow>, CountryServiceError> {
        let payload = serde_json::to_string(rows)
            .map_err(|e| CountryServiceError::MalformedReply(format!("could not encode rows: {}", e)))?;

        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: payload,
                },
            ],
        };

        debug!("Requesting countries for {} ports from {}", rows.len(), self.endpoint);

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CountryServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| CountryServiceError::MalformedReply(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CountryServiceError::MalformedReply("reply has no choices".to_string()))?;

        parse_reply(&content)
    }
}

/// Parse the model's reply text into country rows.
/// Accepts a bare array, an object with a `rows` array, and markdown code fences.
pub fn parse_reply(content: &str) -> Result<Vec<CountryRow>, CountryServiceError> {
    let body = strip_code_fence(content);

    let rows: Vec<ReplyRow> = match serde_json::from_str::<Vec<ReplyRow>>(body) {
        Ok(rows) => rows,
        Err(array_err) => match serde_json::from_str::<WrappedReply>(body) {
            Ok(wrapped) => wrapped.rows,
            Err(_) => return Err(CountryServiceError::MalformedReply(array_err.to_string())),
        },
    };

    Ok(rows
        .into_iter()
        .map(|r| CountryRow {
            key: r.key,
            count: r.count.unwrap_or(0),
            country: r.country.and_then(clean_country),
        })
        .collect())
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json"); the body may follow on the same line
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    let rest = rest.trim();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn clean_country(country: String) -> Option<String> {
    let trimmed = country.trim();
    let lowered = trimmed.to_lowercase();
    if trimmed.is_empty() || lowered == "unknown" || lowered == "null" || lowered == "n/a" {
        None
    } else {
        Some(trimmed.to_string())
    }
}
