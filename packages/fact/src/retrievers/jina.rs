//! Jina Reader retriever.
//!
//! Fetches a page as clean markdown through the Jina Reader API
//! (`GET {reader}/{url}` with a JSON `Accept` header).
//!
//! Requires the `jina` feature to be enabled.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{RetrieveError, RetrieveResult};
use crate::security::SecretString;
use crate::traits::retriever::{RawPage, Retriever};

pub const JINA_READER_URL: &str = "https://r.jina.ai";

/// Jina Reader based retriever.
///
/// ```rust,ignore
/// use fact::retrievers::{JinaRetriever, RateLimitedRetriever};
/// use fact::ValidatedRetriever;
///
/// let jina = JinaRetriever::new(std::env::var("JINA_API_KEY")?)?;
/// let retriever = RateLimitedRetriever::new(ValidatedRetriever::new(jina), 5);
/// ```
pub struct JinaRetriever {
    client: Client,
    api_key: SecretString,
    reader_url: String,
    /// Server-side render budget passed as `X-Timeout`
    render_timeout: Duration,
}

#[derive(Deserialize)]
struct ReaderResponse {
    code: Option<u16>,
    data: Option<ReaderData>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ReaderData {
    url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    #[serde(rename = "publishedTime")]
    published_time: Option<String>,
}

impl JinaRetriever {
    pub fn new(api_key: impl Into<SecretString>) -> RetrieveResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| RetrieveError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            reader_url: JINA_READER_URL.to_string(),
            render_timeout: Duration::from_secs(60),
        })
    }

    /// Set a custom reader endpoint (self-hosted reader, proxies, etc.).
    pub fn with_reader_url(mut self, url: impl Into<String>) -> Self {
        self.reader_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    fn map_send_error(&self, e: reqwest::Error) -> RetrieveError {
        if e.is_timeout() {
            RetrieveError::Timeout(self.render_timeout)
        } else {
            RetrieveError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl Retriever for JinaRetriever {
    async fn retrieve(&self, url: &str) -> RetrieveResult<RawPage> {
        tracing::debug!(url = %url, "Retrieving via Jina Reader");

        let mut request = self
            .client
            .get(format!("{}/{}", self.reader_url, url))
            .header("Accept", "application/json")
            .header("X-Timeout", self.render_timeout.as_secs().to_string())
            .header("X-With-Generated-Alt", "true");
        if !self.api_key.is_blank() {
            request = request.header("Authorization", self.api_key.bearer());
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RetrieveError::Status {
                status: status.as_u16(),
                message: text.chars().take(300).collect(),
            });
        }

        let body: ReaderResponse = response
            .json()
            .await
            .map_err(|e| RetrieveError::Response(e.to_string()))?;

        if let Some(code) = body.code.filter(|c| *c != StatusCode::OK.as_u16()) {
            return Err(RetrieveError::Status {
                status: code,
                message: body.message.unwrap_or_default(),
            });
        }

        let data = body
            .data
            .ok_or_else(|| RetrieveError::Response("reader returned no data".into()))?;

        let mut page = RawPage::new(url, data.content.unwrap_or_default());
        if let Some(title) = data.title.filter(|t| !t.trim().is_empty()) {
            page = page.with_title(title);
        }
        if let Some(final_url) = data.url {
            page = page.with_metadata("final_url", final_url);
        }
        if let Some(description) = data.description {
            page = page.with_metadata("description", description);
        }
        if let Some(published) = data.published_time {
            page = page.with_metadata("published_time", published);
        }

        Ok(page)
    }

    fn name(&self) -> &str {
        "jina"
    }
}
