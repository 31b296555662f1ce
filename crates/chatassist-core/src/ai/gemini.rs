use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{build_prompt, CompletionClient, FALLBACK_REPLY};
use crate::config::Config;
use crate::error::ChatError;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

// Every level is optional: a well-formed body without text is not an error
#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates?
            .into_iter()
            .next()?
            .content?
            .parts?
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.is_empty())
    }
}

/// Google Gemini `generateContent` client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn from_config(config: &Config, api_key: &str) -> anyhow::Result<Self> {
        Ok(Self::new(api_key, config.request_timeout())?
            .with_model(config.model())
            .with_base_url(config.base_url()))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn send(&self, prompt: String) -> Result<String, ChatError> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::request_failed(format!(
                "Gemini API error {}: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            ChatError::request_failed(format!("malformed Gemini response: {}", e))
        })?;

        Ok(parsed.first_text().unwrap_or_else(|| {
            tracing::debug!("Gemini response carried no text, using fallback reply");
            FALLBACK_REPLY.to_string()
        }))
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String, ChatError> {
        let start = Instant::now();
        let result = self.send(build_prompt(system_prompt, user_text)).await;
        let elapsed_ms = start.elapsed().as_millis();

        match &result {
            Ok(text) => tracing::info!(
                model = %self.model,
                duration_ms = %elapsed_ms,
                reply_chars = text.chars().count(),
                "Completion request finished"
            ),
            Err(err) => tracing::warn!(
                model = %self.model,
                duration_ms = %elapsed_ms,
                error = %err,
                "Completion request failed"
            ),
        }

        result
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
