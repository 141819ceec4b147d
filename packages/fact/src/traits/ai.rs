//! Reasoning-oracle trait.
//!
//! The pipeline asks the oracle two questions: which checkable claims a report
//! makes (with their citation markers), and whether a piece of evidence
//! substantiates a claim. Implementations handle transport only; retry and
//! timeout policy live in the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleResult;
use crate::types::task::TaskId;

/// Report handed to the oracle for claim extraction.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub task_id: &'a TaskId,
    pub query: &'a str,
    /// Cleaned report body
    pub body: &'a str,
    pub language: &'a str,
}

/// One claim as enumerated by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedClaim {
    #[serde(alias = "claim", alias = "fact", alias = "text")]
    pub statement: String,

    #[serde(
        default,
        alias = "citation_markers",
        alias = "markers",
        alias = "references",
        alias = "urls"
    )]
    pub citations: Vec<String>,
}

impl ExtractedClaim {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            citations: Vec::new(),
        }
    }

    pub fn cite(mut self, marker: impl Into<String>) -> Self {
        self.citations.push(marker.into());
        self
    }
}

/// The oracle's decision for a claim against evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Support {
    Supported,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub support: Support,
    pub reason: String,
}

impl Judgment {
    pub fn supported(reason: impl Into<String>) -> Self {
        Self {
            support: Support::Supported,
            reason: reason.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            support: Support::Unsupported,
            reason: reason.into(),
        }
    }
}

/// Reasoning oracle used by the Extractor and the Validator.
#[async_trait]
pub trait AI: Send + Sync {
    /// Enumerate every checkable factual claim in a report with its markers.
    async fn extract_claims(&self, report: ReportInput<'_>) -> OracleResult<Vec<ExtractedClaim>>;

    /// Decide whether `evidence` substantiates `claim`.
    async fn judge(&self, claim: &str, evidence: &str) -> OracleResult<Judgment>;

    /// Get the oracle name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}
