//! Testing utilities including a mock oracle.
//!
//! Useful for exercising the pipeline without making real LLM calls. For a
//! mock content-retrieval service see [`crate::retrievers::MockRetriever`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{OracleError, OracleResult};
use crate::traits::ai::{ExtractedClaim, Judgment, ReportInput, AI};
use crate::types::task::TaskId;

/// A mock AI implementation for testing.
///
/// Claims are configured per task, judgments per claim text. Unconfigured
/// tasks yield no claims and unconfigured claims are judged supported.
#[derive(Default, Clone)]
pub struct MockAI {
    /// Predefined claims by task
    claims: Arc<RwLock<HashMap<TaskId, Vec<ExtractedClaim>>>>,

    /// Extraction failures by task
    extraction_errors: Arc<RwLock<HashMap<TaskId, OracleError>>>,

    /// Predefined judgments by claim text
    judgments: Arc<RwLock<HashMap<String, Judgment>>>,

    /// Judging failures by claim text
    judge_errors: Arc<RwLock<HashMap<String, OracleError>>>,

    /// Number of upcoming calls that fail with a network error
    pending_failures: Arc<AtomicUsize>,

    /// Delay applied to every call
    latency: Option<Duration>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockAICall>>>,
}

/// Record of a call made to the mock AI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAICall {
    ExtractClaims { task_id: TaskId },
    Judge { claim: String, evidence_len: usize },
}

impl MockAI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims returned when extracting the given task.
    pub fn with_claims(self, task_id: impl Into<TaskId>, claims: Vec<ExtractedClaim>) -> Self {
        self.claims.write().unwrap().insert(task_id.into(), claims);
        self
    }

    /// Make extraction of the given task fail with `error` on every attempt.
    pub fn with_extraction_error(self, task_id: impl Into<TaskId>, error: OracleError) -> Self {
        self.extraction_errors
            .write()
            .unwrap()
            .insert(task_id.into(), error);
        self
    }

    /// Judgment returned for the given claim text.
    pub fn with_judgment(self, claim: impl Into<String>, judgment: Judgment) -> Self {
        self.judgments.write().unwrap().insert(claim.into(), judgment);
        self
    }

    /// Make judging the given claim fail with `error` on every attempt.
    pub fn with_judge_error(self, claim: impl Into<String>, error: OracleError) -> Self {
        self.judge_errors.write().unwrap().insert(claim.into(), error);
        self
    }

    /// Fail the next `count` calls with a transient network error.
    pub fn with_transient_failures(self, count: usize) -> Self {
        self.pending_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockAICall> {
        self.calls.read().unwrap().clone()
    }

    pub fn extract_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockAICall::ExtractClaims { .. }))
            .count()
    }

    pub fn judge_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockAICall::Judge { .. }))
            .count()
    }

    /// Claims passed to `judge`, in call order.
    pub fn judged_claims(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockAICall::Judge { claim, .. } => Some(claim),
                _ => None,
            })
            .collect()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    async fn before_call(&self, call: MockAICall) -> OracleResult<()> {
        self.calls.write().unwrap().push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(OracleError::Network("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AI for MockAI {
    async fn extract_claims(&self, report: ReportInput<'_>) -> OracleResult<Vec<ExtractedClaim>> {
        self.before_call(MockAICall::ExtractClaims {
            task_id: report.task_id.clone(),
        })
        .await?;

        if let Some(error) = self.extraction_errors.read().unwrap().get(report.task_id) {
            return Err(error.clone());
        }

        Ok(self
            .claims
            .read()
            .unwrap()
            .get(report.task_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn judge(&self, claim: &str, evidence: &str) -> OracleResult<Judgment> {
        self.before_call(MockAICall::Judge {
            claim: claim.to_string(),
            evidence_len: evidence.chars().count(),
        })
        .await?;

        if let Some(error) = self.judge_errors.read().unwrap().get(claim) {
            return Err(error.clone());
        }

        Ok(self
            .judgments
            .read()
            .unwrap()
            .get(claim)
            .cloned()
            .unwrap_or_else(|| Judgment::supported("mock: supported by default")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
