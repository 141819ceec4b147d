//! External service configuration loaded from the environment.
//!
//! Each service is loaded only by the stages that use it, so a missing
//! retrieval key does not stop `extract` and a missing oracle key does not
//! stop `fetch`.

use anyhow::{bail, Context, Result};
use fact::ai::{OpenAI, DEFAULT_BASE_URL, DEFAULT_MODEL};
use fact::retrievers::{JinaRetriever, RateLimitedRetriever, JINA_READER_URL};
use fact::{SecretString, ValidatedRetriever};
use std::env;

/// Retriever stack used by the Fetcher.
pub type SourceRetriever = RateLimitedRetriever<ValidatedRetriever<JinaRetriever>>;

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required_secret(name: &str) -> Result<SecretString> {
    let value = env::var(name).with_context(|| format!("{} must be set", name))?;
    let secret = SecretString::new(value);
    if secret.is_blank() {
        bail!("{} must not be empty", name);
    }
    Ok(secret)
}

/// Reasoning oracle settings (`OPENAI_*`).
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
}

impl OracleConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: required_secret("OPENAI_API_KEY")?,
            base_url: optional_var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: optional_var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    pub fn client(&self) -> OpenAI {
        OpenAI::new(self.api_key.clone())
            .with_base_url(&self.base_url)
            .with_model(&self.model)
    }
}

/// Content-retrieval settings (`JINA_*`).
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub api_key: SecretString,
    pub reader_url: String,
}

impl RetrieverConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: required_secret("JINA_API_KEY")?,
            reader_url: optional_var("JINA_READER_URL").unwrap_or_else(|| JINA_READER_URL.to_string()),
        })
    }

    /// Jina behind the URL safety check and a requests-per-second quota.
    pub fn retriever(&self, requests_per_second: u32) -> Result<SourceRetriever> {
        let jina = JinaRetriever::new(self.api_key.clone())
            .context("Failed to build retrieval client")?
            .with_reader_url(&self.reader_url);
        Ok(RateLimitedRetriever::new(
            ValidatedRetriever::new(jina),
            requests_per_second,
        ))
    }
}
