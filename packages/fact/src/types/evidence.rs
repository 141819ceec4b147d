//! Fetcher output records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::traits::retriever::RawPage;

/// Terminal state of retrieving one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Ok,
    Unreachable,
    Blocked,
    Empty,
}

impl FetchStatus {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Unreachable => "unreachable",
            Self::Blocked => "blocked",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retrieved content for one distinct source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub source_url: String,

    pub fetch_status: FetchStatus,

    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// SHA-256 of the content, for comparing runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub attempts: u32,
}

impl EvidenceRecord {
    pub fn ok(source_url: impl Into<String>, page: RawPage, attempts: u32) -> Self {
        Self {
            source_url: source_url.into(),
            fetch_status: FetchStatus::Ok,
            content_hash: Some(hash_content(&page.content)),
            content: Some(page.content),
            title: page.title,
            error: None,
            attempts,
        }
    }

    pub fn failed(
        source_url: impl Into<String>,
        status: FetchStatus,
        error: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            fetch_status: status,
            content: None,
            title: None,
            content_hash: None,
            error: Some(error.into()),
            attempts,
        }
    }

    /// Content usable as evidence, if any.
    pub fn usable_content(&self) -> Option<&str> {
        if !self.fetch_status.is_usable() {
            return None;
        }
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Hash content for change detection.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
