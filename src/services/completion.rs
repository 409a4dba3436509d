use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    config::Config,
    errors::{AppError, Result},
};

/// Text in, text out. Implementations must bound every call in time.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, message: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

/// OpenAI Responses API client.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        if config.openai_api_key.is_empty() {
            tracing::warn!("OPENAI_API_KEY is not set; chat turns will fail");
        }

        Self::new(
            &config.openai_base_url,
            &config.openai_api_key,
            &config.openai_model,
            Duration::from_secs(config.provider_timeout_secs),
        )
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, message: &str) -> Result<String> {
        let request = ResponsesRequest {
            model: &self.model,
            input: message,
        };

        let response = self
            .client
            .post(format!("{}/v1/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Completion provider returned {}: {}", status, body);
            return Err(AppError::Provider(format!(
                "completion provider returned {}",
                status
            )));
        }

        let parsed: ResponsesResponse = response.json().await.map_err(|e| {
            AppError::Provider(format!("Failed to parse completion response: {}", e))
        })?;

        parsed
            .output
            .into_iter()
            .flat_map(|item| item.content)
            .find(|part| part.kind == "output_text")
            .and_then(|part| part.text)
            .ok_or_else(|| AppError::Provider("completion response had no text".to_string()))
    }
}
