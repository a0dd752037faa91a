//! LLM Client implementations
//!
//! Provides clients for OpenAI-compatible chat APIs (Hugging Face router,
//! OpenAI) and Ollama. Clients are plain values built from configuration;
//! nothing is contacted until `chat` or `health_check` is called.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use okg_core::{ChatMessage, ChatRequest, LlmClient, LlmConfig, LlmProvider, OkgError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| OkgError::LlmError(format!("Failed to build HTTP client: {e}")))
}

fn non_empty(content: Option<String>) -> Result<String> {
    match content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(OkgError::LlmError("Empty response content".to_string())),
    }
}

// ============================================================================
// OpenAI-compatible Client
// ============================================================================

/// Client for OpenAI-compatible `/chat/completions` endpoints
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiResponse {
    fn into_content(self) -> Result<String> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OkgError::LlmError("No response generated".to_string()))?;
        non_empty(choice.message.content)
    }
}

impl OpenAiClient {
    /// Create a new client against the public OpenAI endpoint
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.as_ref().ok_or_else(|| {
            OkgError::ConfigError(format!("API key required for provider {}", config.provider))
        })?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key.clone(),
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Set custom base URL (Hugging Face router, local gateways)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request_body<'a>(&'a self, request: &'a ChatRequest) -> OpenAiRequest<'a> {
        OpenAiRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let body = self.request_body(request);
        debug!(model = %self.model, messages = request.messages.len(), "Sending chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OkgError::LlmError(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OkgError::LlmError(format!(
                "Chat completion error ({status}): {error_text}"
            )));
        }

        let result: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| OkgError::LlmError(format!("Failed to parse response: {e}")))?;

        result.into_content()
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama API client (`/api/chat`)
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct OllamaResponse {
    message: Option<ResponseMessage>,
    done: bool,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = LlmConfig::default();
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn request_body<'a>(&'a self, request: &'a ChatRequest) -> OllamaRequest<'a> {
        OllamaRequest {
            model: &self.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: request.max_tokens.unwrap_or(self.max_tokens),
            },
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let body = self.request_body(request);

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| OkgError::LlmError(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OkgError::LlmError(format!("Ollama error: {error_text}")));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| OkgError::LlmError(format!("Failed to parse Ollama response: {e}")))?;

        non_empty(result.message.and_then(|m| m.content))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider {
        LlmProvider::HuggingFace | LlmProvider::OpenAI => {
            Ok(Arc::new(OpenAiClient::from_config(config)?))
        }
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================
