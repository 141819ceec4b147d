//! Rate-limited retriever wrapper.
//!
//! Wraps any Retriever with a requests-per-second quota using the governor
//! crate. Retries pass through the wrapper too, so they spend quota like any
//! other request.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::RetrieveResult;
use crate::traits::retriever::{RawPage, Retriever};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A retriever wrapper that enforces a request quota.
pub struct RateLimitedRetriever<R: Retriever> {
    inner: R,
    limiter: Arc<DefaultRateLimiter>,
}

impl<R: Retriever> RateLimitedRetriever<R> {
    /// Create a new rate-limited retriever.
    ///
    /// A rate of zero is treated as one request per second.
    pub fn new(retriever: R, requests_per_second: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(retriever, Quota::per_second(rate))
    }

    /// Create with burst support.
    pub fn with_burst(retriever: R, requests_per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(retriever, Quota::per_second(rate).allow_burst(burst))
    }

    /// Create with a custom quota.
    pub fn with_quota(retriever: R, quota: Quota) -> Self {
        Self {
            inner: retriever,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

#[async_trait]
impl<R: Retriever> Retriever for RateLimitedRetriever<R> {
    async fn retrieve(&self, url: &str) -> RetrieveResult<RawPage> {
        self.limiter.until_ready().await;
        self.inner.retrieve(url).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
