//! Mock retriever for testing.
//!
//! Provides a configurable mock implementation of the Retriever trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{RetrieveError, RetrieveResult};
use crate::traits::retriever::{RawPage, Retriever};

/// Canned behaviour for one URL.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return the page
    Page(RawPage),
    /// Respond with an HTTP status
    Status(u16),
    /// Fail at the connection level
    ConnectionError,
    /// Never respond (exercises per-call timeouts)
    Hang,
    /// Fail with a connection error `failures` times, then return the page
    Flaky {
        failures: Arc<AtomicUsize>,
        page: RawPage,
    },
}

/// Mock retriever for testing.
///
/// Unknown URLs respond with HTTP 404. Clones share pages and call history.
///
/// # Example
///
/// ```rust
/// use fact::retrievers::MockRetriever;
/// use fact::RawPage;
///
/// let mock = MockRetriever::new()
///     .with_page(RawPage::new("https://example.com", "# Hello\n\nWorld"))
///     .with_status("https://example.com/gone", 410);
/// ```
#[derive(Default, Clone)]
pub struct MockRetriever {
    responses: Arc<RwLock<HashMap<String, MockResponse>>>,
    latency: Option<Duration>,
    calls: Arc<RwLock<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(&self, url: impl Into<String>, response: MockResponse) {
        self.responses.write().unwrap().insert(url.into(), response);
    }

    /// Serve a page at its own URL.
    pub fn with_page(self, page: RawPage) -> Self {
        self.add_response(page.url.clone(), MockResponse::Page(page));
        self
    }

    /// Serve `content` at `url`.
    pub fn with_content(self, url: &str, content: &str) -> Self {
        self.with_page(RawPage::new(url, content))
    }

    pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
        self.add_response(url, MockResponse::Status(status));
        self
    }

    pub fn with_connection_error(self, url: impl Into<String>) -> Self {
        self.add_response(url, MockResponse::ConnectionError);
        self
    }

    pub fn with_hang(self, url: impl Into<String>) -> Self {
        self.add_response(url, MockResponse::Hang);
        self
    }

    /// Fail `failures` times before serving `page`.
    pub fn with_flaky_page(self, page: RawPage, failures: usize) -> Self {
        self.add_response(
            page.url.clone(),
            MockResponse::Flaky {
                failures: Arc::new(AtomicUsize::new(failures)),
                page,
            },
        );
        self
    }

    /// Delay every response (makes concurrency observable).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// URLs requested, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn retrieve_count(&self, url: &str) -> usize {
        self.calls.read().unwrap().iter().filter(|u| *u == url).count()
    }

    /// Highest number of calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self, url: &str) -> RetrieveResult<RawPage> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let response = self.responses.read().unwrap().get(url).cloned();
        match response {
            Some(MockResponse::Page(page)) => Ok(page),
            Some(MockResponse::Status(status)) => Err(RetrieveError::Status {
                status,
                message: format!("mock status for {}", url),
            }),
            Some(MockResponse::ConnectionError) => {
                Err(RetrieveError::Network("connection refused".into()))
            }
            Some(MockResponse::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(RetrieveError::Network("hung request returned".into()))
            }
            Some(MockResponse::Flaky { failures, page }) => {
                let failed = failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if failed {
                    Err(RetrieveError::Network("connection reset".into()))
                } else {
                    Ok(page)
                }
            }
            None => Err(RetrieveError::Status {
                status: 404,
                message: format!("no mock response for {}", url),
            }),
        }
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    async fn retrieve(&self, url: &str) -> RetrieveResult<RawPage> {
        self.calls.write().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.respond(url).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        result
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_serves_pages_and_statuses() {
        let mock = MockRetriever::new()
            .with_content("https://example.com/a", "Page A")
            .with_status("https://example.com/gone", 410);

        let page = mock.retrieve("https://example.com/a").await.unwrap();
        assert_eq!(page.content, "Page A");

        let err = mock.retrieve("https://example.com/gone").await.unwrap_err();
        assert!(matches!(err, RetrieveError::Status { status: 410, .. }));

        let err = mock.retrieve("https://example.com/missing").await.unwrap_err();
        assert!(matches!(err, RetrieveError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_mock_flaky_page_recovers() {
        let mock = MockRetriever::new().with_flaky_page(RawPage::new("https://f.com", "ok"), 2);

        assert!(mock.retrieve("https://f.com").await.is_err());
        assert!(mock.retrieve("https://f.com").await.is_err());
        assert!(mock.retrieve("https://f.com").await.is_ok());
        assert_eq!(mock.retrieve_count("https://f.com"), 3);
    }

    #[tokio::test]
    async fn test_clones_share_call_history() {
        let mock = MockRetriever::new().with_content("https://a.com", "a");
        let clone = mock.clone();

        clone.retrieve("https://a.com").await.unwrap();
        assert_eq!(mock.call_count(), 1);
    }
}
