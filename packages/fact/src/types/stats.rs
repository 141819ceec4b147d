//! Aggregator output records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::config::UnverifiablePolicy;
use super::task::{TaskId, TaskStatus};

/// Trust statistics for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub task_id: TaskId,
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Distinct supported pairs
    pub effective_citations: usize,

    /// supported / scorable pairs; `None` when nothing was scorable
    pub citation_accuracy: Option<f64>,

    /// Whether any (claim, source) pair was cited, scorable or not
    pub coverage_flag: bool,

    pub supported: usize,
    pub unsupported: usize,
    pub unverifiable: usize,
    pub unresolvable: usize,
    pub pair_count: usize,

    /// Citation mentions before deduplication
    pub citation_count: usize,
}

/// Corpus figures for one language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageSummary {
    pub tasks: usize,
    pub mean_citation_accuracy: Option<f64>,
    pub mean_effective_citations: Option<f64>,
}

/// Corpus-level summary over every task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub tasks_total: usize,
    pub tasks_scored: usize,
    pub tasks_failed: usize,
    pub tasks_with_citations: usize,
    pub tasks_without_citations: usize,

    /// Mean over tasks whose accuracy is defined
    pub mean_citation_accuracy: Option<f64>,

    /// Mean over tasks that did not fail extraction
    pub mean_effective_citations: Option<f64>,

    pub total_pairs: usize,
    pub total_supported: usize,
    pub total_unsupported: usize,
    pub total_unverifiable: usize,
    pub total_unresolvable: usize,

    pub unverifiable_policy: UnverifiablePolicy,

    #[serde(default)]
    pub by_language: BTreeMap<String, LanguageSummary>,
}

/// One line of the Aggregator output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum StatsLine {
    Task(TaskStats),
    Corpus(CorpusSummary),
}

/// Per-task entry in the scores file read by the quality scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactScore {
    pub task_id: TaskId,
    pub citation_accuracy: f64,
    pub effective_citations: usize,
}

impl From<&TaskStats> for FactScore {
    fn from(stats: &TaskStats) -> Self {
        Self {
            task_id: stats.task_id.clone(),
            citation_accuracy: stats.citation_accuracy.unwrap_or(0.0),
            effective_citations: stats.effective_citations,
        }
    }
}
