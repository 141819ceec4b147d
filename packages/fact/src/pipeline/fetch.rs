//! Fetcher: retrieve each distinct source exactly once.

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use indexmap::IndexSet;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::pipeline::retry::with_retry;
use crate::traits::retriever::Retriever;
use crate::types::config::{FetchConfig, RetryPolicy};
use crate::types::evidence::{EvidenceRecord, FetchStatus};
use crate::types::pair::PairLine;

/// Evidence keyed by canonical source URL.
///
/// Concurrent requests for the same URL share one retrieval: the first
/// caller runs it, the rest wait on the same cell.
#[derive(Default)]
pub struct FetchCache {
    entries: DashMap<String, Arc<OnceCell<EvidenceRecord>>>,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with records from an earlier run.
    ///
    /// Only records with usable content are kept, so failed sources are
    /// tried again. Returns how many were added.
    pub fn seed(&self, records: impl IntoIterator<Item = EvidenceRecord>) -> usize {
        let mut seeded = 0;
        for record in records {
            if record.usable_content().is_none() || self.entries.contains_key(&record.source_url) {
                continue;
            }
            let url = record.source_url.clone();
            self.entries
                .insert(url, Arc::new(OnceCell::new_with(Some(record))));
            seeded += 1;
        }
        seeded
    }

    /// Completed record for `url`, if any.
    pub fn get(&self, url: &str) -> Option<EvidenceRecord> {
        self.entries.get(url).and_then(|cell| cell.get().cloned())
    }

    /// Return the record for `url`, running `fetch` if nobody has yet.
    pub async fn get_or_fetch<F, Fut>(&self, url: &str, fetch: F) -> EvidenceRecord
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EvidenceRecord>,
    {
        // Clone the cell out so the shard lock is not held across the await.
        let cell = Arc::clone(&self.entries.entry(url.to_string()).or_default());
        cell.get_or_init(fetch).await.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolvable source URLs in first-seen order.
pub fn distinct_sources(pairs: &[PairLine]) -> Vec<String> {
    let sources: IndexSet<&str> = pairs
        .iter()
        .filter_map(|line| match line {
            PairLine::Pair(pair) if pair.resolvable => pair.source_url.as_deref(),
            _ => None,
        })
        .collect();
    sources.into_iter().map(str::to_string).collect()
}

/// Retrieve one source under the retry policy.
pub async fn fetch_source<R: Retriever + ?Sized>(
    url: &str,
    retriever: &R,
    policy: &RetryPolicy,
) -> EvidenceRecord {
    let outcome = with_retry(policy, url, move |_| retriever.retrieve(url)).await;
    let attempts = outcome.attempts;

    match outcome.result {
        Ok(page) if page.has_content() => EvidenceRecord::ok(url, page, attempts),
        Ok(_) => EvidenceRecord::failed(url, FetchStatus::Empty, "retrieved page has no content", attempts),
        Err(e) => EvidenceRecord::failed(url, e.fetch_status(), e.to_string(), attempts),
    }
}

/// Fetch every distinct source named by `pairs`.
///
/// Output holds one record per distinct resolvable URL, in first-seen order.
pub async fn run_fetch<R: Retriever + ?Sized>(
    pairs: &[PairLine],
    retriever: &R,
    cache: &FetchCache,
    config: &FetchConfig,
) -> Vec<EvidenceRecord> {
    let sources = distinct_sources(pairs);
    info!(
        sources = sources.len(),
        cached = cache.len(),
        workers = config.workers,
        retriever = retriever.name(),
        "Starting fetch"
    );

    let records: Vec<EvidenceRecord> = stream::iter(sources.iter())
        .map(|url| async move {
            if let Some(record) = cache.get(url) {
                debug!(url = %url, "Reusing cached evidence");
                return record;
            }

            let record = cache
                .get_or_fetch(url, || fetch_source(url, retriever, &config.retry))
                .await;
            if !record.fetch_status.is_usable() {
                warn!(
                    url = %url,
                    status = %record.fetch_status,
                    attempts = record.attempts,
                    error = record.error.as_deref().unwrap_or(""),
                    "Source not usable"
                );
            }
            if !config.delay.is_zero() {
                tokio::time::sleep(config.delay).await;
            }
            record
        })
        .buffered(config.workers.max(1))
        .collect()
        .await;

    let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
    for record in &records {
        *by_status.entry(record.fetch_status.as_str()).or_default() += 1;
    }
    info!(
        sources = records.len(),
        ok = by_status.get("ok").copied().unwrap_or(0),
        unreachable = by_status.get("unreachable").copied().unwrap_or(0),
        blocked = by_status.get("blocked").copied().unwrap_or(0),
        empty = by_status.get("empty").copied().unwrap_or(0),
        "Fetch complete"
    );
    records
}
