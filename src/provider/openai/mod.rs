
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{EmbeddingBatch, Embedder, Generator};
use crate::config::ProviderConfig;
use crate::{RagError, Result};

const EMBEDDINGS_ENDPOINT: &str = "embeddings";
const RESPONSES_ENDPOINT: &str = "responses";

/// Blocking client for an OpenAI-compatible embeddings and responses API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    embedding_model: String,
    generation_model: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        if let Some(text) = self.output_text {
            return Some(text);
        }

        let parts: Vec<String> = self
            .output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|content| content.kind == "output_text")
            .filter_map(|content| content.text)
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.concat())
        }
    }
}

impl OpenAiClient {
    /// Build a client from provider settings.
    ///
    /// The API key is read from the environment once, here. A missing key is not
    /// reported until the provider rejects the first request.
    #[inline]
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = config
            .api_url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let api_key = config.api_key();
        if api_key.is_none() {
            debug!(
                "No API key found in ${}, requests will be sent unauthenticated",
                config.api_key_env
            );
        }

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            api_key,
            agent: Self::build_agent(config.timeout_secs.map(Duration::from_secs)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = Self::build_agent(Some(timeout));
        self
    }

    #[inline]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn build_agent(timeout: Option<Duration>) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_global(timeout)
            .http_status_as_error(false)
            .build()
            .into()
    }

    fn post_json<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<String> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| RagError::Config(format!("Failed to build {} URL: {}", endpoint, e)))?;

        let request_json = serde_json::to_string(body)
            .map_err(|e| RagError::Network(format!("Failed to serialize request: {}", e)))?;

        debug!("POST {} ({} bytes)", url, request_json.len());

        let mut request = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let mut response = request
            .send(&request_json)
            .map_err(|e| RagError::Network(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        let response_text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RagError::Network(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorResponse>(&response_text)
                .map_or_else(|_| response_text.trim().to_string(), |e| e.error.message);
            warn!("{} returned HTTP {}: {}", url, status.as_u16(), detail);
            return Err(RagError::Network(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                endpoint,
                detail
            )));
        }

        Ok(response_text)
    }
}

impl Embedder for OpenAiClient {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch::empty());
        }

        debug!(
            "Generating embeddings for {} texts with {}",
            texts.len(),
            self.embedding_model
        );

        let request = EmbedRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let response_text = self.post_json(EMBEDDINGS_ENDPOINT, &request)?;

        let mut response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Embedding(format!("Failed to parse embedding response: {}", e))
        })?;

        response.data.sort_by_key(|d| d.index);
        if let Some((position, data)) = response
            .data
            .iter()
            .enumerate()
            .find(|(position, data)| data.index != *position)
        {
            return Err(RagError::Embedding(format!(
                "Embedding response index {} found at position {}",
                data.index, position
            )));
        }

        let batch = EmbeddingBatch::new(
            response.data.into_iter().map(|d| d.embedding).collect(),
            texts.len(),
        )?;

        debug!(
            "Generated {} embeddings with {} dimensions",
            batch.len(),
            batch.dimension()
        );
        Ok(batch)
    }
}

impl Generator for OpenAiClient {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            "Generating answer with {} (prompt length: {})",
            self.generation_model,
            prompt.len()
        );

        let request = GenerateRequest {
            model: &self.generation_model,
            input: prompt,
        };
        let response_text = self.post_json(RESPONSES_ENDPOINT, &request)?;

        let response: GenerateResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Generation(format!("Failed to parse generation response: {}", e))
        })?;

        response
            .into_text()
            .ok_or_else(|| RagError::Generation("Response contained no output text".to_string()))
    }
}
