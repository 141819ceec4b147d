//! Integration tests for the full stage chain.
//!
//! Every stage reads the previous stage's file and writes its own, the way
//! the CLI runs them:
//! 1. Extract claims from reports
//! 2. Deduplicate into pairs
//! 3. Fetch distinct sources
//! 4. Validate pairs against evidence
//! 5. Aggregate statistics

use fact::io::{read_jsonl, write_jsonl};
use fact::retrievers::MockRetriever;
use fact::testing::MockAI;
use fact::{
    aggregate, deduplicate, fact_scores, run_extraction, run_fetch, run_validation,
    AggregateConfig, CorpusSummary, DedupInput, EvidenceIndex, EvidenceRecord, ExtractConfig,
    ExtractedClaim, ExtractionLine, FactError, FetchCache, FetchConfig, FetchStatus, Judgment,
    PairLine, PairRecord, RetryPolicy, StatsLine, Task, TaskStats, ValidateConfig, Verdict,
    VerdictLine, VerdictRecord,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(3)
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(5))
        .with_call_timeout(Duration::from_millis(100))
}

/// Stage files inside one temp directory.
struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Run every stage through files and return the stats records.
async fn run_chain(work: &WorkDir, tasks: &[Task], ai: &MockAI, retriever: &MockRetriever) -> Vec<StatsLine> {
    write_jsonl(&work.path("tasks.jsonl"), tasks).unwrap();

    let tasks: Vec<Task> = read_jsonl(&work.path("tasks.jsonl")).unwrap();
    let extract_config = ExtractConfig::default().with_workers(4).with_retry(fast_retry());
    let claims = run_extraction(&tasks, ai, &extract_config).await;
    write_jsonl(&work.path("claims.jsonl"), &claims).unwrap();

    let claims: Vec<DedupInput> = read_jsonl(&work.path("claims.jsonl")).unwrap();
    let pairs = deduplicate(claims);
    write_jsonl(&work.path("pairs.jsonl"), &pairs).unwrap();

    let pairs: Vec<PairLine> = read_jsonl(&work.path("pairs.jsonl")).unwrap();
    let fetch_config = FetchConfig::default().with_workers(4).with_retry(fast_retry());
    let evidence = run_fetch(&pairs, retriever, &FetchCache::new(), &fetch_config).await;
    write_jsonl(&work.path("evidence.jsonl"), &evidence).unwrap();

    let evidence: Vec<EvidenceRecord> = read_jsonl(&work.path("evidence.jsonl")).unwrap();
    let validate_config = ValidateConfig::default().with_workers(4).with_retry(fast_retry());
    let verdicts = run_validation(pairs, &EvidenceIndex::new(evidence), ai, &validate_config)
        .await
        .unwrap();
    write_jsonl(&work.path("verdicts.jsonl"), &verdicts).unwrap();

    let verdicts: Vec<VerdictLine> = read_jsonl(&work.path("verdicts.jsonl")).unwrap();
    let stats = aggregate(&verdicts, &AggregateConfig::default());
    write_jsonl(&work.path("stats.jsonl"), &stats).unwrap();
    stats
}

fn read<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    read_jsonl(path).unwrap()
}

fn pair_records(lines: &[PairLine]) -> Vec<&PairRecord> {
    lines
        .iter()
        .filter_map(|l| match l {
            PairLine::Pair(p) => Some(p),
            _ => None,
        })
        .collect()
}

fn verdict_records(lines: &[VerdictLine]) -> Vec<&VerdictRecord> {
    lines
        .iter()
        .filter_map(|l| match l {
            VerdictLine::Verdict(v) => Some(v),
            _ => None,
        })
        .collect()
}

fn task_stats<'a>(stats: &'a [StatsLine], task_id: &str) -> &'a TaskStats {
    stats
        .iter()
        .find_map(|l| match l {
            StatsLine::Task(t) if t.task_id.as_str() == task_id => Some(t),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no stats for task {}", task_id))
}

fn corpus(stats: &[StatsLine]) -> &CorpusSummary {
    match stats.last() {
        Some(StatsLine::Corpus(c)) => c,
        other => panic!("expected corpus record last, got {:?}", other),
    }
}

#[tokio::test]
async fn test_live_and_dead_sources() {
    let work = WorkDir::new();
    let report = "GDP grew 3% [1]. As noted, GDP grew 3%. [2] Exports fell [3].\n\n\
                  ## References\n\
                  [1] Stats Office https://live.com/gdp\n\
                  [2] http://LIVE.com/gdp/?utm_source=newsletter\n\
                  [3] https://dead.com/page";
    let tasks = vec![Task::new("1", "How is the economy?", report)];
    let ai = MockAI::new().with_claims(
        "1",
        vec![
            ExtractedClaim::new("GDP grew 3%").cite("[1]"),
            ExtractedClaim::new("GDP grew 3%.").cite("[2]"),
            ExtractedClaim::new("Exports fell").cite("[3]"),
        ],
    );
    let retriever = MockRetriever::new()
        .with_content("https://live.com/gdp", "GDP grew by 3% last year.")
        .with_connection_error("https://dead.com/page");

    let stats = run_chain(&work, &tasks, &ai, &retriever).await;

    let pairs: Vec<PairLine> = read(&work.path("pairs.jsonl"));
    let pairs = pair_records(&pairs);
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].source_url.as_deref(), Some("https://live.com/gdp"));
    assert_eq!(pairs[0].mention_count, 2);

    let evidence: Vec<EvidenceRecord> = read(&work.path("evidence.jsonl"));
    assert_eq!(evidence.len(), 2);
    assert_eq!(evidence[1].fetch_status, FetchStatus::Unreachable);
    assert_eq!(retriever.retrieve_count("https://live.com/gdp"), 1);

    let verdicts: Vec<VerdictLine> = read(&work.path("verdicts.jsonl"));
    let verdicts = verdict_records(&verdicts);
    assert_eq!(verdicts[0].verdict, Verdict::Supported);
    assert_eq!(verdicts[1].verdict, Verdict::Unverifiable);
    assert!(!verdicts[1].oracle_called);
    assert_eq!(ai.judge_call_count(), 1);

    let task = task_stats(&stats, "1");
    assert_eq!(task.effective_citations, 1);
    assert_eq!(task.citation_accuracy, Some(1.0));
    assert_eq!(task.unverifiable, 1);
    assert_eq!(task.citation_count, 3);
}

#[tokio::test]
async fn test_every_verdict_source_is_in_evidence() {
    let work = WorkDir::new();
    let tasks = vec![
        Task::new("a", "q", "One [1]. Two [2].\n\nReferences\n[1] https://x.com\n[2] https://y.com"),
        Task::new("b", "q", "Three [1].\n\nReferences\n[1] https://x.com/"),
    ];
    let ai = MockAI::new()
        .with_claims(
            "a",
            vec![ExtractedClaim::new("One").cite("[1]"), ExtractedClaim::new("Two").cite("[2]")],
        )
        .with_claims("b", vec![ExtractedClaim::new("Three").cite("[1]").cite("[4]")])
        .with_judgment("Two", Judgment::unsupported("not mentioned"));
    let retriever = MockRetriever::new()
        .with_content("https://x.com", "x")
        .with_content("https://y.com", "y");

    run_chain(&work, &tasks, &ai, &retriever).await;

    let evidence: Vec<EvidenceRecord> = read(&work.path("evidence.jsonl"));
    let sources: Vec<&str> = evidence.iter().map(|e| e.source_url.as_str()).collect();
    assert_eq!(sources, vec!["https://x.com", "https://y.com"]);

    let verdicts: Vec<VerdictLine> = read(&work.path("verdicts.jsonl"));
    for verdict in verdict_records(&verdicts) {
        if let Some(url) = &verdict.source_url {
            assert!(sources.contains(&url.as_str()), "{} not fetched", url);
        } else {
            assert!(!verdict.resolvable);
        }
    }
}

#[tokio::test]
async fn test_fetch_timing_out_every_attempt_is_unreachable() {
    let work = WorkDir::new();
    let tasks = vec![Task::new("1", "q", "Claim [1].\n\nReferences\n[1] https://slow.com")];
    let ai = MockAI::new().with_claims("1", vec![ExtractedClaim::new("Claim").cite("[1]")]);
    let retriever = MockRetriever::new().with_hang("https://slow.com");

    let stats = run_chain(&work, &tasks, &ai, &retriever).await;

    let evidence: Vec<EvidenceRecord> = read(&work.path("evidence.jsonl"));
    assert_eq!(evidence[0].fetch_status, FetchStatus::Unreachable);
    assert_eq!(evidence[0].attempts, 3);
    assert_eq!(retriever.retrieve_count("https://slow.com"), 3);

    let task = task_stats(&stats, "1");
    assert_eq!(task.citation_accuracy, None);
    assert_eq!(ai.judge_call_count(), 0);
}

#[tokio::test]
async fn test_zero_citation_report() {
    let work = WorkDir::new();
    let tasks = vec![Task::new("1", "q", "The sky is blue. Water is wet.")];
    let ai = MockAI::new().with_claims(
        "1",
        vec![ExtractedClaim::new("The sky is blue"), ExtractedClaim::new("Water is wet")],
    );

    let stats = run_chain(&work, &tasks, &ai, &MockRetriever::new()).await;

    let claims: Vec<ExtractionLine> = read(&work.path("claims.jsonl"));
    let ExtractionLine::Task(header) = &claims[0] else {
        panic!("expected header first");
    };
    assert_eq!(header.uncited_claim_count, 2);

    let task = task_stats(&stats, "1");
    assert!(!task.coverage_flag);
    assert_eq!(task.citation_accuracy, None);
    assert_eq!(corpus(&stats).tasks_without_citations, 1);

    let scores = fact_scores(&stats);
    assert_eq!(scores[0].citation_accuracy, 0.0);
}

#[tokio::test]
async fn test_shared_source_is_fetched_once() {
    let work = WorkDir::new();
    let mut tasks = Vec::new();
    let mut ai = MockAI::new();
    for t in 0..10 {
        let id = format!("t{}", t);
        tasks.push(Task::new(id.as_str(), "q", "Report [1]\n\nReferences\n[1] https://shared.com/page"));
        let claims = (0..10)
            .map(|c| ExtractedClaim::new(format!("claim {} of {}", c, id)).cite("[1]"))
            .collect();
        ai = ai.with_claims(id.as_str(), claims);
    }
    let retriever = MockRetriever::new()
        .with_content("https://shared.com/page", "shared content")
        .with_latency(Duration::from_millis(5));

    let stats = run_chain(&work, &tasks, &ai, &retriever).await;

    let pairs: Vec<PairLine> = read(&work.path("pairs.jsonl"));
    assert_eq!(pair_records(&pairs).len(), 100);
    assert_eq!(retriever.call_count(), 1);
    assert_eq!(corpus(&stats).total_supported, 100);
}

#[tokio::test]
async fn test_dedup_is_idempotent_through_files() {
    let work = WorkDir::new();
    let tasks = vec![Task::new(
        "1",
        "q",
        "“Quoted” claim [1][2]. Range claim [1-3].\n\nReferences\n[1] https://a.com/?b=1&a=2\n[2] https://b.com#top\n[3] not a url",
    )];
    let ai = MockAI::new().with_claims(
        "1",
        vec![
            ExtractedClaim::new("“Quoted” claim").cite("[1]").cite("[2]"),
            ExtractedClaim::new("Range claim").cite("[1-3]"),
            ExtractedClaim::new("\"Quoted\" claim.").cite("[1]"),
        ],
    );
    let extract_config = ExtractConfig::default().with_retry(fast_retry());
    let claims = run_extraction(&tasks, &ai, &extract_config).await;
    write_jsonl(&work.path("claims.jsonl"), &claims).unwrap();

    let first = deduplicate(read::<DedupInput>(&work.path("claims.jsonl")));
    write_jsonl(&work.path("pairs.jsonl"), &first).unwrap();
    let second = deduplicate(read::<DedupInput>(&work.path("pairs.jsonl")));
    write_jsonl(&work.path("pairs2.jsonl"), &second).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        std::fs::read_to_string(work.path("pairs.jsonl")).unwrap(),
        std::fs::read_to_string(work.path("pairs2.jsonl")).unwrap()
    );

    let pairs = pair_records(&first);
    let quoted = pairs
        .iter()
        .find(|p| p.claim_text == "\"Quoted\" claim" && p.source_url.as_deref() == Some("https://a.com/?a=2&b=1"))
        .unwrap();
    assert_eq!(quoted.mention_count, 2);
    assert!(pairs.iter().any(|p| !p.resolvable && p.citation_marker == "3"));
}

#[tokio::test]
async fn test_missing_evidence_is_fatal() {
    let work = WorkDir::new();
    let pairs = deduplicate(vec![DedupInput::Pair(PairRecord {
        task_id: "1".into(),
        claim_text: "Claim".into(),
        source_url: Some("https://unfetched.com".into()),
        source_title: None,
        citation_marker: "1".into(),
        resolvable: true,
        mention_count: 1,
    })]);
    write_jsonl(&work.path("pairs.jsonl"), &pairs).unwrap();
    write_jsonl::<EvidenceRecord>(&work.path("evidence.jsonl"), &[]).unwrap();

    let pairs: Vec<PairLine> = read(&work.path("pairs.jsonl"));
    let evidence: Vec<EvidenceRecord> = read(&work.path("evidence.jsonl"));
    let ai = MockAI::new();
    let err = run_validation(pairs, &EvidenceIndex::new(evidence), &ai, &ValidateConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FactError::MissingEvidence { ref url, .. } if url == "https://unfetched.com"));
    assert_eq!(ai.judge_call_count(), 0);
}

#[tokio::test]
async fn test_failed_extraction_is_reported_not_scored() {
    let work = WorkDir::new();
    let tasks = vec![
        Task::new("good", "q", "Fact [1].\n\nReferences\n[1] https://a.com"),
        Task::new("bad", "q", "Report the oracle cannot read"),
        Task::new("empty", "q", ""),
    ];
    let ai = MockAI::new()
        .with_claims("good", vec![ExtractedClaim::new("Fact").cite("[1]")])
        .with_extraction_error("bad", fact::OracleError::Parse("not json".into()));
    let retriever = MockRetriever::new().with_content("https://a.com", "fact");

    let stats = run_chain(&work, &tasks, &ai, &retriever).await;

    let summary = corpus(&stats);
    assert_eq!(summary.tasks_total, 3);
    assert_eq!(summary.tasks_failed, 2);
    assert_eq!(summary.tasks_scored, 1);
    assert_eq!(summary.mean_citation_accuracy, Some(1.0));
    assert!(task_stats(&stats, "bad").citation_accuracy.is_none());
}
