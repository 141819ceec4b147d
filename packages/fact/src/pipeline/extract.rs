//! Extractor: turn each report into claim records.
//!
//! One oracle call per task enumerates the claims and their markers; the
//! report's own reference list is parsed locally and attached to each claim
//! so the Deduplicator can resolve numbered markers without the report.

use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::canonical::{parse_marker, MarkerRef};
use crate::pipeline::report::{clean_report, parse_references};
use crate::pipeline::retry::with_retry;
use crate::traits::ai::{ExtractedClaim, ReportInput, AI};
use crate::types::claim::{ClaimRecord, ExtractionLine, Source};
use crate::types::config::ExtractConfig;
use crate::types::task::{Task, TaskHeader};

/// Counts reported at the end of an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub tasks: usize,
    pub failed: usize,
    pub claims: usize,
    pub uncited_claims: usize,
    pub citations: usize,
}

impl ExtractSummary {
    pub fn from_lines(lines: &[ExtractionLine]) -> Self {
        let mut summary = Self::default();
        for line in lines {
            match line {
                ExtractionLine::Task(header) => {
                    summary.tasks += 1;
                    if header.is_failed() {
                        summary.failed += 1;
                    }
                    summary.uncited_claims += header.uncited_claim_count;
                    summary.citations += header.citation_count;
                }
                ExtractionLine::Claim(_) => summary.claims += 1,
            }
        }
        summary
    }
}

/// Extract one task: its header followed by its claims in ordinal order.
///
/// Never fails; an unusable report or oracle failure yields a single
/// `extraction_failed` header.
pub async fn extract_task<A: AI + ?Sized>(
    task: &Task,
    ai: &A,
    config: &ExtractConfig,
) -> Vec<ExtractionLine> {
    let body = clean_report(&task.article);
    if body.is_empty() {
        warn!(task_id = %task.id, "Report body is empty, skipping oracle call");
        return vec![ExtractionLine::Task(TaskHeader::failed(task, "empty report body"))];
    }

    let mut header = TaskHeader::extracted(task);
    let language = header.language.clone().unwrap_or_else(|| "en".to_string());
    let references = parse_references(&body);
    debug!(task_id = %task.id, references = references.len(), "Parsed reference list");

    let input = ReportInput {
        task_id: &task.id,
        query: &task.prompt,
        body: &body,
        language: &language,
    };
    let label = format!("extract task {}", task.id);
    let outcome = with_retry(&config.retry, &label, move |_| ai.extract_claims(input)).await;

    let extracted = match outcome.result {
        Ok(claims) => claims,
        Err(e) => {
            warn!(task_id = %task.id, attempts = outcome.attempts, error = %e, "Extraction failed");
            let error = format!("{} (after {} attempts)", e, outcome.attempts);
            return vec![ExtractionLine::Task(TaskHeader::failed(task, error))];
        }
    };

    let claims = build_claims(task, extracted, &references);
    header.claim_count = claims.len();
    header.uncited_claim_count = claims.iter().filter(|c| !c.is_cited()).count();
    header.citation_count = claims
        .iter()
        .flat_map(|c| c.citation_markers.iter())
        .map(|m| parse_marker(m).len())
        .sum();

    debug!(
        task_id = %task.id,
        claims = header.claim_count,
        uncited = header.uncited_claim_count,
        citations = header.citation_count,
        "Extracted claims"
    );

    let mut lines = Vec::with_capacity(claims.len() + 1);
    lines.push(ExtractionLine::Task(header));
    lines.extend(claims.into_iter().map(ExtractionLine::Claim));
    lines
}

fn build_claims(
    task: &Task,
    extracted: Vec<ExtractedClaim>,
    references: &BTreeMap<String, Source>,
) -> Vec<ClaimRecord> {
    extracted
        .into_iter()
        .filter(|c| !c.statement.trim().is_empty())
        .enumerate()
        .map(|(index, claim)| {
            let markers: Vec<String> = claim
                .citations
                .iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();

            let mut used = BTreeMap::new();
            for marker in &markers {
                for reference in parse_marker(marker) {
                    if let MarkerRef::Reference(number) = reference {
                        if let Some(source) = references.get(&number) {
                            used.insert(number, source.clone());
                        }
                    }
                }
            }

            ClaimRecord {
                task_id: task.id.clone(),
                position: index + 1,
                claim_text: claim.statement.trim().to_string(),
                citation_markers: markers,
                references: used,
            }
        })
        .collect()
}

/// Extract every task with up to `config.workers` tasks in flight.
///
/// Output keeps input task order; each task's records are contiguous.
pub async fn run_extraction<A: AI + ?Sized>(
    tasks: &[Task],
    ai: &A,
    config: &ExtractConfig,
) -> Vec<ExtractionLine> {
    info!(tasks = tasks.len(), workers = config.workers, "Starting extraction");

    let mut results: Vec<(usize, Vec<ExtractionLine>)> = stream::iter(tasks.iter().enumerate())
        .map(|(index, task)| async move { (index, extract_task(task, ai, config).await) })
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await;
    results.sort_by_key(|(index, _)| *index);

    let lines: Vec<ExtractionLine> = results.into_iter().flat_map(|(_, lines)| lines).collect();

    let summary = ExtractSummary::from_lines(&lines);
    info!(
        tasks = summary.tasks,
        failed = summary.failed,
        claims = summary.claims,
        uncited = summary.uncited_claims,
        citations = summary.citations,
        "Extraction complete"
    );
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::testing::MockAI;
    use crate::types::config::RetryPolicy;
    use crate::types::task::TaskStatus;
    use std::time::Duration;

    fn config() -> ExtractConfig {
        ExtractConfig::default().with_workers(2).with_retry(
            RetryPolicy::new()
                .with_max_attempts(3)
                .with_base_delay(Duration::from_millis(1))
                .with_call_timeout(Duration::from_secs(5)),
        )
    }

    fn header(lines: &[ExtractionLine]) -> &TaskHeader {
        match &lines[0] {
            ExtractionLine::Task(h) => h,
            other => panic!("expected header first, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_extracts_claims_with_references() {
        let task = Task::new(
            "1",
            "What happened?",
            "GDP grew 3% [1]. Unemployment fell [2][3]. Analysts were upbeat.\n\n## References\n[1] Stats Office https://stats.gov/gdp\n[2] https://jobs.gov/report",
        );
        let ai = MockAI::new().with_claims(
            "1",
            vec![
                ExtractedClaim::new("GDP grew 3%").cite("[1]"),
                ExtractedClaim::new("Unemployment fell").cite("[2]").cite("[3]"),
                ExtractedClaim::new("Analysts were upbeat"),
            ],
        );

        let lines = extract_task(&task, &ai, &config()).await;
        assert_eq!(lines.len(), 4);

        let h = header(&lines);
        assert_eq!(h.status, TaskStatus::Extracted);
        assert_eq!(h.claim_count, 3);
        assert_eq!(h.uncited_claim_count, 1);
        assert_eq!(h.citation_count, 3);
        assert_eq!(h.language.as_deref(), Some("en"));

        let ExtractionLine::Claim(first) = &lines[1] else {
            panic!("expected claim");
        };
        assert_eq!(first.position, 1);
        assert_eq!(first.references["1"].url, "https://stats.gov/gdp");

        let ExtractionLine::Claim(second) = &lines[2] else {
            panic!("expected claim");
        };
        // [3] has no entry in the reference list
        assert_eq!(second.references.len(), 1);
        assert!(second.references.contains_key("2"));
    }

    #[tokio::test]
    async fn test_empty_body_fails_without_oracle_call() {
        let task = Task::new("1", "q", "  \n ");
        let ai = MockAI::new();

        let lines = extract_task(&task, &ai, &config()).await;
        assert_eq!(lines.len(), 1);
        assert!(header(&lines).is_failed());
        assert_eq!(ai.extract_call_count(), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_is_retried_once_then_marks_task_failed() {
        let task = Task::new("1", "q", "Some report");
        let ai = MockAI::new().with_extraction_error("1", OracleError::Parse("not json".into()));

        let lines = extract_task(&task, &ai, &config()).await;
        assert_eq!(lines.len(), 1);
        let h = header(&lines);
        assert!(h.is_failed());
        assert!(h.error.as_deref().unwrap().contains("after 2 attempts"));
        assert_eq!(ai.extract_call_count(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let task = Task::new("1", "q", "Some report [1]");
        let ai = MockAI::new()
            .with_claims("1", vec![ExtractedClaim::new("A claim").cite("[1]")])
            .with_transient_failures(2);

        let lines = extract_task(&task, &ai, &config()).await;
        assert_eq!(lines.len(), 2);
        assert!(!header(&lines).is_failed());
        assert_eq!(ai.extract_call_count(), 3);
    }

    #[tokio::test]
    async fn test_run_keeps_task_order_and_covers_every_task() {
        let tasks: Vec<Task> = (1..=5)
            .map(|i| Task::new(i.to_string(), "q", format!("Report {}", i)))
            .collect();
        let ai = MockAI::new()
            .with_claims("2", vec![ExtractedClaim::new("claim two").cite("[1]")])
            .with_extraction_error("4", OracleError::Config("no key".into()))
            .with_latency(Duration::from_millis(5));

        let lines = run_extraction(&tasks, &ai, &config()).await;

        let task_ids: Vec<&str> = lines
            .iter()
            .filter_map(|l| match l {
                ExtractionLine::Task(h) => Some(h.task_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(task_ids, vec!["1", "2", "3", "4", "5"]);

        let summary = ExtractSummary::from_lines(&lines);
        assert_eq!(summary.tasks, 5);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.claims, 1);
    }
}
