//! Retriever trait for source content.
//!
//! A retriever turns one canonical source URL into page content. The Fetcher
//! wraps every call with its own timeout and retry budget, so implementations
//! make a single attempt and report what went wrong through
//! [`RetrieveError`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{RetrieveError, RetrieveResult};
use crate::security::UrlValidator;

/// Retrieved page content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage {
    /// URL the content was retrieved for
    pub url: String,

    /// Page text (usually markdown)
    pub content: String,

    pub title: Option<String>,

    /// When the content was fetched
    pub fetched_at: DateTime<Utc>,

    /// Service-specific metadata (e.g., description, published time)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RawPage {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
            title: None,
            fetched_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check if this page has content.
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Content-retrieval service.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Make one attempt at retrieving `url`.
    async fn retrieve(&self, url: &str) -> RetrieveResult<RawPage>;

    /// Get the retriever name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

/// A retriever that validates URLs before fetching (SSRF protection).
///
/// ```rust,ignore
/// let retriever = ValidatedRetriever::new(JinaRetriever::new(api_key));
/// ```
pub struct ValidatedRetriever<R: Retriever> {
    inner: R,
    validator: UrlValidator,
}

impl<R: Retriever> ValidatedRetriever<R> {
    /// Create a new validated retriever with default security rules.
    pub fn new(retriever: R) -> Self {
        Self {
            inner: retriever,
            validator: UrlValidator::new(),
        }
    }

    /// Create with a custom validator.
    pub fn with_validator(retriever: R, validator: UrlValidator) -> Self {
        Self {
            inner: retriever,
            validator,
        }
    }
}

#[async_trait]
impl<R: Retriever> Retriever for ValidatedRetriever<R> {
    async fn retrieve(&self, url: &str) -> RetrieveResult<RawPage> {
        self.validator.validate(url).map_err(RetrieveError::Security)?;
        self.inner.retrieve(url).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
