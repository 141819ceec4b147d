//! Extractor output records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::task::{TaskHeader, TaskId};

/// A cited resource: URL plus optional title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// An atomic factual statement extracted from a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub task_id: TaskId,

    /// Ordinal position in the report
    pub position: usize,

    pub claim_text: String,

    /// Raw markers as they appeared next to the claim
    #[serde(default)]
    pub citation_markers: Vec<String>,

    /// Reference-list entries for the markers this claim uses
    #[serde(default)]
    pub references: BTreeMap<String, Source>,
}

impl ClaimRecord {
    pub fn is_cited(&self) -> bool {
        self.citation_markers.iter().any(|m| !m.trim().is_empty())
    }
}

/// One line of the Extractor output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum ExtractionLine {
    Task(TaskHeader),
    Claim(ClaimRecord),
}
