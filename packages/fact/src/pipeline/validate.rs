//! Validator: judge each pair against its source's evidence.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{FactError, Result};
use crate::pipeline::retry::with_retry;
use crate::traits::ai::{Support, AI};
use crate::types::config::ValidateConfig;
use crate::types::evidence::EvidenceRecord;
use crate::types::pair::{PairLine, PairRecord};
use crate::types::verdict::{Verdict, VerdictLine, VerdictRecord};

/// Evidence records indexed by source URL. The first record for a URL wins.
#[derive(Debug, Clone, Default)]
pub struct EvidenceIndex {
    records: HashMap<String, EvidenceRecord>,
}

impl EvidenceIndex {
    pub fn new(records: impl IntoIterator<Item = EvidenceRecord>) -> Self {
        let mut index = HashMap::new();
        for record in records {
            index.entry(record.source_url.clone()).or_insert(record);
        }
        Self { records: index }
    }

    pub fn get(&self, url: &str) -> Option<&EvidenceRecord> {
        self.records.get(url)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fail if any resolvable pair has no evidence record.
pub fn check_coverage(pairs: &[PairLine], evidence: &EvidenceIndex) -> Result<()> {
    for line in pairs {
        if let PairLine::Pair(pair) = line {
            if let Some(url) = pair.source_url.as_deref().filter(|_| pair.resolvable) {
                if evidence.get(url).is_none() {
                    return Err(FactError::MissingEvidence {
                        task_id: pair.task_id.to_string(),
                        url: url.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Cut `text` to at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Judge one pair.
///
/// Pairs without a resolvable source or usable evidence are
/// `unverifiable` without consulting the oracle.
pub async fn validate_pair<A: AI + ?Sized>(
    pair: &PairRecord,
    evidence: &EvidenceIndex,
    ai: &A,
    config: &ValidateConfig,
) -> VerdictRecord {
    let Some(url) = pair.source_url.as_deref().filter(|_| pair.resolvable) else {
        return VerdictRecord::for_pair(pair, Verdict::Unverifiable)
            .with_reason(format!("unresolvable citation marker: {}", pair.citation_marker));
    };

    let Some(record) = evidence.get(url) else {
        return VerdictRecord::for_pair(pair, Verdict::Unverifiable)
            .with_reason("no evidence record for source");
    };

    let Some(content) = record.usable_content() else {
        return VerdictRecord::for_pair(pair, Verdict::Unverifiable)
            .with_fetch_status(record.fetch_status)
            .with_reason(format!("source {}", record.fetch_status));
    };

    let content = truncate_chars(content, config.max_evidence_chars);
    let claim = pair.claim_text.as_str();
    let label = format!("judge {} {}", pair.task_id, url);
    let outcome = with_retry(&config.retry, &label, move |_| ai.judge(claim, content)).await;

    let base = VerdictRecord::for_pair(pair, Verdict::Unverifiable)
        .with_fetch_status(record.fetch_status)
        .oracle_called();
    match outcome.result {
        Ok(judgment) => {
            let verdict = match judgment.support {
                Support::Supported => Verdict::Supported,
                Support::Unsupported => Verdict::Unsupported,
            };
            let record = VerdictRecord { verdict, ..base };
            if judgment.reason.is_empty() {
                record
            } else {
                record.with_reason(judgment.reason)
            }
        }
        Err(e) => {
            warn!(
                task_id = %pair.task_id,
                url = %url,
                attempts = outcome.attempts,
                error = %e,
                "Oracle could not judge pair"
            );
            base.with_reason(format!("oracle failed after {} attempts: {}", outcome.attempts, e))
        }
    }
}

/// Judge every pair, preserving input order.
///
/// Task headers pass through unchanged. Fails before any oracle call if a
/// resolvable pair has no evidence record.
pub async fn run_validation<A: AI + ?Sized>(
    pairs: Vec<PairLine>,
    evidence: &EvidenceIndex,
    ai: &A,
    config: &ValidateConfig,
) -> Result<Vec<VerdictLine>> {
    check_coverage(&pairs, evidence)?;

    let pair_count = pairs.iter().filter(|l| matches!(l, PairLine::Pair(_))).count();
    info!(
        pairs = pair_count,
        sources = evidence.len(),
        workers = config.workers,
        oracle = ai.name(),
        "Starting validation"
    );

    let lines: Vec<VerdictLine> = stream::iter(pairs)
        .map(|line| async move {
            match line {
                PairLine::Task(header) => VerdictLine::Task(header),
                PairLine::Pair(pair) => {
                    let verdict = validate_pair(&pair, evidence, ai, config).await;
                    debug!(
                        task_id = %verdict.task_id,
                        verdict = ?verdict.verdict,
                        oracle_called = verdict.oracle_called,
                        "Judged pair"
                    );
                    VerdictLine::Verdict(verdict)
                }
            }
        })
        .buffered(config.workers.max(1))
        .collect()
        .await;

    let (mut supported, mut unsupported, mut unverifiable, mut oracle_calls) = (0, 0, 0, 0);
    for line in &lines {
        if let VerdictLine::Verdict(v) = line {
            match v.verdict {
                Verdict::Supported => supported += 1,
                Verdict::Unsupported => unsupported += 1,
                Verdict::Unverifiable => unverifiable += 1,
            }
            if v.oracle_called {
                oracle_calls += 1;
            }
        }
    }
    info!(supported, unsupported, unverifiable, oracle_calls, "Validation complete");

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::testing::MockAI;
    use crate::traits::ai::Judgment;
    use crate::traits::retriever::RawPage;
    use crate::types::config::RetryPolicy;
    use crate::types::evidence::FetchStatus;
    use crate::types::task::{Task, TaskHeader, TaskId};
    use std::time::Duration;

    fn config() -> ValidateConfig {
        ValidateConfig::default().with_workers(3).with_retry(
            RetryPolicy::new()
                .with_max_attempts(3)
                .with_base_delay(Duration::from_millis(1)),
        )
    }

    fn pair(claim: &str, url: Option<&str>) -> PairRecord {
        PairRecord {
            task_id: TaskId::new("1"),
            claim_text: claim.to_string(),
            source_url: url.map(str::to_string),
            source_title: None,
            citation_marker: "1".to_string(),
            resolvable: url.is_some(),
            mention_count: 1,
        }
    }

    fn evidence() -> EvidenceIndex {
        EvidenceIndex::new(vec![
            EvidenceRecord::ok("https://ok.com", RawPage::new("https://ok.com", "The sky is blue."), 1),
            EvidenceRecord::failed("https://dead.com", FetchStatus::Unreachable, "timeout", 3),
        ])
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[tokio::test]
    async fn test_unresolvable_pair_skips_oracle() {
        let ai = MockAI::new();
        let verdict = validate_pair(&pair("claim", None), &evidence(), &ai, &config()).await;
        assert_eq!(verdict.verdict, Verdict::Unverifiable);
        assert!(!verdict.oracle_called);
        assert_eq!(ai.judge_call_count(), 0);
    }

    #[tokio::test]
    async fn test_dead_source_skips_oracle() {
        let ai = MockAI::new();
        let verdict = validate_pair(&pair("claim", Some("https://dead.com")), &evidence(), &ai, &config()).await;
        assert_eq!(verdict.verdict, Verdict::Unverifiable);
        assert_eq!(verdict.fetch_status, Some(FetchStatus::Unreachable));
        assert_eq!(ai.judge_call_count(), 0);
    }

    #[tokio::test]
    async fn test_oracle_verdicts() {
        let ai = MockAI::new().with_judgment("The sky is green", Judgment::unsupported("says blue"));

        let yes = validate_pair(&pair("The sky is blue", Some("https://ok.com")), &evidence(), &ai, &config()).await;
        assert_eq!(yes.verdict, Verdict::Supported);
        assert!(yes.oracle_called);

        let no = validate_pair(&pair("The sky is green", Some("https://ok.com")), &evidence(), &ai, &config()).await;
        assert_eq!(no.verdict, Verdict::Unsupported);
        assert_eq!(no.reason.as_deref(), Some("says blue"));
    }

    #[tokio::test]
    async fn test_oracle_failure_is_unverifiable_with_call_recorded() {
        let ai = MockAI::new().with_judge_error("claim", OracleError::Network("down".into()));
        let verdict = validate_pair(&pair("claim", Some("https://ok.com")), &evidence(), &ai, &config()).await;
        assert_eq!(verdict.verdict, Verdict::Unverifiable);
        assert!(verdict.oracle_called);
        assert_eq!(ai.judge_call_count(), 3);
    }

    #[tokio::test]
    async fn test_evidence_is_truncated() {
        let long = "x".repeat(500);
        let evidence = EvidenceIndex::new(vec![EvidenceRecord::ok(
            "https://long.com",
            RawPage::new("https://long.com", long),
            1,
        )]);
        let ai = MockAI::new();
        let config = config().with_max_evidence_chars(100);

        validate_pair(&pair("claim", Some("https://long.com")), &evidence, &ai, &config).await;
        assert_eq!(
            ai.calls(),
            vec![crate::testing::MockAICall::Judge {
                claim: "claim".into(),
                evidence_len: 100
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_evidence_is_fatal() {
        let ai = MockAI::new();
        let lines = vec![PairLine::Pair(pair("claim", Some("https://unknown.com")))];
        let err = run_validation(lines, &evidence(), &ai, &config()).await.unwrap_err();
        assert!(matches!(err, FactError::MissingEvidence { .. }));
        assert_eq!(ai.judge_call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_preserves_order_and_headers() {
        let ai = MockAI::new().with_latency(Duration::from_millis(5));
        let header = TaskHeader::extracted(&Task::new("1", "q", "report"));
        let mut lines = vec![PairLine::Task(header.clone())];
        for i in 0..6 {
            lines.push(PairLine::Pair(pair(&format!("claim {}", i), Some("https://ok.com"))));
        }

        let out = run_validation(lines, &evidence(), &ai, &config()).await.unwrap();
        assert_eq!(out.len(), 7);
        assert_eq!(out[0], VerdictLine::Task(header));
        let claims: Vec<_> = out[1..]
            .iter()
            .map(|l| match l {
                VerdictLine::Verdict(v) => v.claim_text.clone(),
                _ => panic!("expected verdict"),
            })
            .collect();
        assert_eq!(claims, (0..6).map(|i| format!("claim {}", i)).collect::<Vec<_>>());
    }
}
