//! Aggregator: verdicts to per-task and corpus trust statistics.
//!
//! Pure and deterministic: no I/O, no oracle.

use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::info;

use crate::types::config::{AggregateConfig, UnverifiablePolicy};
use crate::types::stats::{CorpusSummary, FactScore, LanguageSummary, StatsLine, TaskStats};
use crate::types::task::{TaskHeader, TaskId, TaskStatus};
use crate::types::verdict::{Verdict, VerdictLine, VerdictRecord};

#[derive(Default)]
struct TaskVerdicts<'a> {
    header: Option<&'a TaskHeader>,
    verdicts: Vec<&'a VerdictRecord>,
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Statistics for one task.
pub fn task_stats(
    header: &TaskHeader,
    verdicts: &[&VerdictRecord],
    policy: UnverifiablePolicy,
) -> TaskStats {
    let mut stats = TaskStats {
        task_id: header.task_id.clone(),
        status: header.status,
        language: header.language.clone(),
        effective_citations: 0,
        citation_accuracy: None,
        coverage_flag: false,
        supported: 0,
        unsupported: 0,
        unverifiable: 0,
        unresolvable: 0,
        pair_count: verdicts.len(),
        citation_count: header.citation_count,
    };
    if header.is_failed() {
        return stats;
    }

    let mut mentions = 0usize;
    for verdict in verdicts {
        mentions += verdict.mention_count as usize;
        match (verdict.resolvable, verdict.verdict) {
            (false, _) => stats.unresolvable += 1,
            (true, Verdict::Supported) => stats.supported += 1,
            (true, Verdict::Unsupported) => stats.unsupported += 1,
            (true, Verdict::Unverifiable) => stats.unverifiable += 1,
        }
    }
    stats.citation_count = stats.citation_count.max(mentions);
    stats.effective_citations = stats.supported;
    stats.coverage_flag = stats.pair_count > 0;

    let scorable = match policy {
        UnverifiablePolicy::Exclude => stats.supported + stats.unsupported,
        UnverifiablePolicy::CountAsUnsupported => {
            stats.supported + stats.unsupported + stats.unverifiable + stats.unresolvable
        }
    };
    if scorable > 0 {
        stats.citation_accuracy = Some(stats.supported as f64 / scorable as f64);
    }
    stats
}

/// Corpus summary over per-task statistics.
///
/// Tasks that failed extraction count toward `tasks_total` and
/// `tasks_failed` only.
pub fn corpus_summary(tasks: &[TaskStats], policy: UnverifiablePolicy) -> CorpusSummary {
    let scored: Vec<&TaskStats> = tasks
        .iter()
        .filter(|t| t.status != TaskStatus::ExtractionFailed)
        .collect();

    let mut grouped: BTreeMap<String, Vec<&TaskStats>> = BTreeMap::new();
    for task in &scored {
        let language = task.language.clone().unwrap_or_else(|| "unknown".to_string());
        grouped.entry(language).or_default().push(task);
    }
    let by_language = grouped
        .into_iter()
        .map(|(language, tasks)| {
            let summary = LanguageSummary {
                tasks: tasks.len(),
                mean_citation_accuracy: mean(tasks.iter().filter_map(|t| t.citation_accuracy)),
                mean_effective_citations: mean(tasks.iter().map(|t| t.effective_citations as f64)),
            };
            (language, summary)
        })
        .collect();

    let with_citations = scored.iter().filter(|t| t.coverage_flag).count();

    CorpusSummary {
        tasks_total: tasks.len(),
        tasks_scored: scored.len(),
        tasks_failed: tasks.len() - scored.len(),
        tasks_with_citations: with_citations,
        tasks_without_citations: scored.len() - with_citations,
        mean_citation_accuracy: mean(scored.iter().filter_map(|t| t.citation_accuracy)),
        mean_effective_citations: mean(scored.iter().map(|t| t.effective_citations as f64)),
        total_pairs: scored.iter().map(|t| t.pair_count).sum(),
        total_supported: scored.iter().map(|t| t.supported).sum(),
        total_unsupported: scored.iter().map(|t| t.unsupported).sum(),
        total_unverifiable: scored.iter().map(|t| t.unverifiable).sum(),
        total_unresolvable: scored.iter().map(|t| t.unresolvable).sum(),
        unverifiable_policy: policy,
        by_language,
    }
}

/// Aggregate a Validator output into one `task` record per task (first-seen
/// order) followed by the `corpus` record.
pub fn aggregate(lines: &[VerdictLine], config: &AggregateConfig) -> Vec<StatsLine> {
    let mut tasks: IndexMap<&TaskId, TaskVerdicts<'_>> = IndexMap::new();
    for line in lines {
        match line {
            VerdictLine::Task(header) => {
                let entry = tasks.entry(&header.task_id).or_default();
                if entry.header.is_none() {
                    entry.header = Some(header);
                }
            }
            VerdictLine::Verdict(verdict) => {
                tasks.entry(&verdict.task_id).or_default().verdicts.push(verdict);
            }
        }
    }

    let policy = config.unverifiable_policy;
    let stats: Vec<TaskStats> = tasks
        .into_iter()
        .map(|(task_id, entry)| match entry.header {
            Some(header) => task_stats(header, &entry.verdicts, policy),
            None => task_stats(&TaskHeader::implied(task_id.clone()), &entry.verdicts, policy),
        })
        .collect();

    let corpus = corpus_summary(&stats, policy);
    info!(
        tasks = corpus.tasks_total,
        scored = corpus.tasks_scored,
        failed = corpus.tasks_failed,
        without_citations = corpus.tasks_without_citations,
        mean_accuracy = corpus.mean_citation_accuracy.unwrap_or(f64::NAN),
        mean_effective_citations = corpus.mean_effective_citations.unwrap_or(f64::NAN),
        policy = %policy,
        "Aggregation complete"
    );

    let mut output: Vec<StatsLine> = stats.into_iter().map(StatsLine::Task).collect();
    output.push(StatsLine::Corpus(corpus));
    output
}

/// Per-task scores in the format the quality scorer reads.
pub fn fact_scores(lines: &[StatsLine]) -> Vec<FactScore> {
    lines
        .iter()
        .filter_map(|line| match line {
            StatsLine::Task(stats) => Some(FactScore::from(stats)),
            StatsLine::Corpus(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::task::Task;

    fn header(id: &str, language: &str) -> VerdictLine {
        VerdictLine::Task(TaskHeader::extracted(&Task::new(id, "q", "report").with_language(language)))
    }

    fn verdict(task: &str, claim: &str, verdict: Verdict, resolvable: bool) -> VerdictLine {
        VerdictLine::Verdict(VerdictRecord {
            task_id: TaskId::new(task),
            claim_text: claim.to_string(),
            source_url: resolvable.then(|| format!("https://{}.com", claim)),
            resolvable,
            verdict,
            mention_count: 1,
            oracle_called: resolvable && verdict != Verdict::Unverifiable,
            fetch_status: None,
            reason: None,
        })
    }

    fn task(lines: &[StatsLine], index: usize) -> &TaskStats {
        match &lines[index] {
            StatsLine::Task(t) => t,
            other => panic!("expected task stats, got {:?}", other),
        }
    }

    fn corpus(lines: &[StatsLine]) -> &CorpusSummary {
        match lines.last() {
            Some(StatsLine::Corpus(c)) => c,
            other => panic!("expected corpus last, got {:?}", other),
        }
    }

    #[test]
    fn test_accuracy_excludes_unverifiable_by_default() {
        let lines = vec![
            header("1", "en"),
            verdict("1", "a", Verdict::Supported, true),
            verdict("1", "b", Verdict::Unsupported, true),
            verdict("1", "c", Verdict::Unverifiable, true),
            verdict("1", "d", Verdict::Unverifiable, false),
        ];
        let out = aggregate(&lines, &AggregateConfig::default());
        let stats = task(&out, 0);

        assert_eq!(stats.effective_citations, 1);
        assert_eq!(stats.citation_accuracy, Some(0.5));
        assert!(stats.coverage_flag);
        assert_eq!((stats.unverifiable, stats.unresolvable), (1, 1));
        assert_eq!(stats.pair_count, 4);
    }

    #[test]
    fn test_count_as_unsupported_policy() {
        let lines = vec![
            header("1", "en"),
            verdict("1", "a", Verdict::Supported, true),
            verdict("1", "b", Verdict::Unsupported, true),
            verdict("1", "c", Verdict::Unverifiable, true),
            verdict("1", "d", Verdict::Unverifiable, false),
        ];
        let config = AggregateConfig::default()
            .with_unverifiable_policy(UnverifiablePolicy::CountAsUnsupported);
        let out = aggregate(&lines, &config);
        assert_eq!(task(&out, 0).citation_accuracy, Some(0.25));
        assert_eq!(corpus(&out).unverifiable_policy, UnverifiablePolicy::CountAsUnsupported);
    }

    #[test]
    fn test_zero_citation_task_has_null_accuracy() {
        let out = aggregate(&[header("1", "en")], &AggregateConfig::default());
        let stats = task(&out, 0);
        assert_eq!(stats.citation_accuracy, None);
        assert!(!stats.coverage_flag);
        assert_eq!(stats.effective_citations, 0);

        let summary = corpus(&out);
        assert_eq!(summary.tasks_without_citations, 1);
        assert_eq!(summary.mean_citation_accuracy, None);
        assert_eq!(summary.mean_effective_citations, Some(0.0));
    }

    #[test]
    fn test_dead_citations_still_count_as_coverage() {
        let lines = vec![
            header("1", "en"),
            verdict("1", "a", Verdict::Unverifiable, true),
            verdict("1", "b", Verdict::Unverifiable, false),
        ];
        let out = aggregate(&lines, &AggregateConfig::default());
        let stats = task(&out, 0);

        assert_eq!(stats.citation_accuracy, None);
        assert!(stats.coverage_flag);
        assert_eq!(stats.citation_count, 2);

        let summary = corpus(&out);
        assert_eq!(summary.tasks_with_citations, 1);
        assert_eq!(summary.tasks_without_citations, 0);
        assert_eq!(summary.mean_citation_accuracy, None);
    }

    #[test]
    fn test_failed_tasks_are_excluded_from_means() {
        let mut failed = TaskHeader::failed(&Task::new("2", "q", "r"), "bad reply");
        failed.language = Some("en".into());
        let lines = vec![
            header("1", "en"),
            verdict("1", "a", Verdict::Supported, true),
            VerdictLine::Task(failed),
        ];
        let out = aggregate(&lines, &AggregateConfig::default());

        assert_eq!(task(&out, 1).status, TaskStatus::ExtractionFailed);
        let summary = corpus(&out);
        assert_eq!(summary.tasks_total, 2);
        assert_eq!(summary.tasks_failed, 1);
        assert_eq!(summary.tasks_scored, 1);
        assert_eq!(summary.mean_citation_accuracy, Some(1.0));
        assert_eq!(summary.tasks_without_citations, 0);
    }

    #[test]
    fn test_corpus_means_and_language_breakdown() {
        let lines = vec![
            header("1", "en"),
            verdict("1", "a", Verdict::Supported, true),
            verdict("1", "b", Verdict::Supported, true),
            header("2", "zh"),
            verdict("2", "c", Verdict::Unsupported, true),
            header("3", "en"),
        ];
        let out = aggregate(&lines, &AggregateConfig::default());
        let summary = corpus(&out);

        assert_eq!(summary.mean_citation_accuracy, Some(0.5));
        assert_eq!(summary.mean_effective_citations, Some(2.0 / 3.0));
        assert_eq!(summary.by_language["en"].tasks, 2);
        assert_eq!(summary.by_language["en"].mean_citation_accuracy, Some(1.0));
        assert_eq!(summary.by_language["zh"].mean_citation_accuracy, Some(0.0));
    }

    #[test]
    fn test_verdicts_without_header_get_implied_task() {
        let out = aggregate(
            &[verdict("9", "a", Verdict::Supported, true)],
            &AggregateConfig::default(),
        );
        let stats = task(&out, 0);
        assert_eq!(stats.task_id.as_str(), "9");
        assert_eq!(stats.citation_count, 1);
    }

    #[test]
    fn test_fact_scores_write_null_accuracy_as_zero() {
        let out = aggregate(&[header("1", "en")], &AggregateConfig::default());
        let scores = fact_scores(&out);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].citation_accuracy, 0.0);
    }
}
