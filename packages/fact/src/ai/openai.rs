//! OpenAI-compatible implementation of the AI trait.
//!
//! Talks to any `/chat/completions` endpoint (OpenAI, OpenRouter, vLLM, ...).
//!
//! # Example
//!
//! ```rust,ignore
//! use fact::ai::OpenAI;
//!
//! let ai = OpenAI::new("sk-...").with_model("gpt-4o").with_base_url("https://api.openai.com/v1");
//! ```

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{OracleError, OracleResult};
use crate::pipeline::prompts::{
    format_extract_prompt, format_judge_prompt, parse_claims_reply, parse_judgment_reply,
    EXTRACT_CLAIMS_SYSTEM, JUDGE_SYSTEM,
};
use crate::security::SecretString;
use crate::traits::ai::{ExtractedClaim, Judgment, ReportInput, AI};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-pro";

/// OpenAI-compatible chat client.
#[derive(Clone)]
pub struct OpenAI {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAI {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.1,
            max_tokens: 4000,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (for OpenRouter, Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Get the current model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Make a chat completion request.
    async fn chat(&self, system: &str, user: &str) -> OracleResult<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", self.api_key.bearer())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                OracleError::RateLimited(error_text)
            } else {
                OracleError::Api {
                    status: status.as_u16(),
                    message: error_text,
                }
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Network(format!("reading response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| OracleError::Parse("empty completion".into()))
    }
}

#[async_trait]
impl AI for OpenAI {
    async fn extract_claims(&self, report: ReportInput<'_>) -> OracleResult<Vec<ExtractedClaim>> {
        let user = format_extract_prompt(report.query, report.body, report.language);
        let reply = self.chat(EXTRACT_CLAIMS_SYSTEM, &user).await?;
        parse_claims_reply(&reply)
    }

    async fn judge(&self, claim: &str, evidence: &str) -> OracleResult<Judgment> {
        let user = format_judge_prompt(claim, evidence);
        let reply = self.chat(JUDGE_SYSTEM, &user).await?;
        parse_judgment_reply(&reply)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// Request/Response types for the chat completions API

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
