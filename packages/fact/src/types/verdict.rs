//! Validator output records.

use serde::{Deserialize, Serialize};

use super::evidence::FetchStatus;
use super::pair::PairRecord;
use super::task::{TaskHeader, TaskId};

/// Terminal outcome of validating one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Supported,
    Unsupported,
    Unverifiable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub task_id: TaskId,
    pub claim_text: String,
    pub source_url: Option<String>,
    pub resolvable: bool,
    pub verdict: Verdict,

    #[serde(default = "default_mention_count")]
    pub mention_count: u32,

    /// Whether the oracle was consulted for this pair
    pub oracle_called: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_status: Option<FetchStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn default_mention_count() -> u32 {
    1
}

impl VerdictRecord {
    /// Start a verdict for a pair; callers fill in the outcome.
    pub fn for_pair(pair: &PairRecord, verdict: Verdict) -> Self {
        Self {
            task_id: pair.task_id.clone(),
            claim_text: pair.claim_text.clone(),
            source_url: pair.source_url.clone(),
            resolvable: pair.resolvable,
            verdict,
            mention_count: pair.mention_count,
            oracle_called: false,
            fetch_status: None,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_fetch_status(mut self, status: FetchStatus) -> Self {
        self.fetch_status = Some(status);
        self
    }

    pub fn oracle_called(mut self) -> Self {
        self.oracle_called = true;
        self
    }
}

/// One line of the Validator output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum VerdictLine {
    Task(TaskHeader),
    Verdict(VerdictRecord),
}
