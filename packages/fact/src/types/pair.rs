//! Deduplicator output records.

use serde::{Deserialize, Serialize};

use super::claim::ClaimRecord;
use super::task::{TaskHeader, TaskId};

/// The unit of verification: one claim against one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub task_id: TaskId,

    /// Canonical claim text
    pub claim_text: String,

    /// Canonical source URL; `None` when the marker could not be resolved
    pub source_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,

    /// First marker that produced this pair
    pub citation_marker: String,

    pub resolvable: bool,

    /// Original mentions collapsed into this record
    #[serde(default = "default_mention_count")]
    pub mention_count: u32,
}

fn default_mention_count() -> u32 {
    1
}

/// What a pair points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PairTarget {
    Source(String),
    Unresolved(String),
}

/// Deduplication key: (task, canonical claim, canonical source).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub task_id: TaskId,
    pub claim_text: String,
    pub target: PairTarget,
}

impl PairRecord {
    pub fn key(&self) -> PairKey {
        let target = match &self.source_url {
            Some(url) if self.resolvable => PairTarget::Source(url.clone()),
            _ => PairTarget::Unresolved(self.citation_marker.clone()),
        };
        PairKey {
            task_id: self.task_id.clone(),
            claim_text: self.claim_text.clone(),
            target,
        }
    }
}

/// One line of the Deduplicator output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum PairLine {
    Task(TaskHeader),
    Pair(PairRecord),
}

/// Anything the Deduplicator accepts: Extractor output or its own output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum DedupInput {
    Task(TaskHeader),
    Claim(ClaimRecord),
    Pair(PairRecord),
}

impl From<super::claim::ExtractionLine> for DedupInput {
    fn from(line: super::claim::ExtractionLine) -> Self {
        match line {
            super::claim::ExtractionLine::Task(h) => Self::Task(h),
            super::claim::ExtractionLine::Claim(c) => Self::Claim(c),
        }
    }
}

impl From<PairLine> for DedupInput {
    fn from(line: PairLine) -> Self {
        match line {
            PairLine::Task(h) => Self::Task(h),
            PairLine::Pair(p) => Self::Pair(p),
        }
    }
}
