//! Deduplicator: expand claims into (claim, source) pairs and collapse repeats.
//!
//! Accepts Extractor output or its own output, so running it twice gives the
//! same file.

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::canonical::{canonicalize_claim, canonicalize_url, parse_marker, MarkerRef};
use crate::types::claim::ClaimRecord;
use crate::types::pair::{DedupInput, PairKey, PairLine, PairRecord};
use crate::types::task::{TaskHeader, TaskId};

#[derive(Default)]
struct TaskBucket {
    header: Option<TaskHeader>,
    pairs: IndexMap<PairKey, PairRecord>,
}

impl TaskBucket {
    fn merge(&mut self, pair: PairRecord) {
        match self.pairs.entry(pair.key()) {
            Entry::Occupied(mut existing) => {
                let existing = existing.get_mut();
                existing.mention_count += pair.mention_count;
                if existing.source_title.is_none() {
                    existing.source_title = pair.source_title;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(pair);
            }
        }
    }
}

fn resolved(task_id: &TaskId, claim_text: &str, url: String, title: Option<String>, marker: &str) -> PairRecord {
    PairRecord {
        task_id: task_id.clone(),
        claim_text: claim_text.to_string(),
        source_url: Some(url),
        source_title: title,
        citation_marker: marker.to_string(),
        resolvable: true,
        mention_count: 1,
    }
}

fn unresolved(task_id: &TaskId, claim_text: &str, marker: &str) -> PairRecord {
    PairRecord {
        task_id: task_id.clone(),
        claim_text: claim_text.to_string(),
        source_url: None,
        source_title: None,
        citation_marker: marker.to_string(),
        resolvable: false,
        mention_count: 1,
    }
}

/// Expand one claim into a pair per cited source.
///
/// A claim without markers produces no pairs.
pub fn pairs_from_claim(claim: &ClaimRecord) -> Vec<PairRecord> {
    let claim_text = canonicalize_claim(&claim.claim_text);
    if claim_text.is_empty() {
        return Vec::new();
    }

    let mut pairs = Vec::new();
    for marker in &claim.citation_markers {
        for reference in parse_marker(marker) {
            let pair = match reference {
                MarkerRef::Reference(number) => {
                    let source = claim.references.get(&number).and_then(|source| {
                        canonicalize_url(&source.url).map(|url| (url, source.title.clone()))
                    });
                    match source {
                        Some((url, title)) => resolved(&claim.task_id, &claim_text, url, title, &number),
                        None => unresolved(&claim.task_id, &claim_text, &number),
                    }
                }
                MarkerRef::Url(raw) => match canonicalize_url(&raw) {
                    Some(url) => resolved(&claim.task_id, &claim_text, url, None, &raw),
                    None => unresolved(&claim.task_id, &claim_text, &raw),
                },
                MarkerRef::Unparseable(raw) => unresolved(&claim.task_id, &claim_text, &raw),
            };
            pairs.push(pair);
        }
    }
    pairs
}

/// Re-apply canonicalization to a pair read back from a previous run.
fn recanonicalize(mut pair: PairRecord) -> PairRecord {
    pair.claim_text = canonicalize_claim(&pair.claim_text);
    let url = pair
        .source_url
        .take()
        .filter(|_| pair.resolvable)
        .and_then(|url| canonicalize_url(&url));
    pair.resolvable = url.is_some();
    pair.source_url = url;
    pair
}

/// Collapse Extractor (or Deduplicator) records into one record per
/// distinct (task, claim, source).
///
/// Tasks keep first-seen order; each task's header precedes its pairs, and
/// pairs keep first-seen order with mention counts summed.
pub fn deduplicate(lines: impl IntoIterator<Item = DedupInput>) -> Vec<PairLine> {
    let mut buckets: IndexMap<TaskId, TaskBucket> = IndexMap::new();
    let mut mentions = 0u64;

    for line in lines {
        match line {
            DedupInput::Task(header) => {
                let bucket = buckets.entry(header.task_id.clone()).or_default();
                if bucket.header.is_none() {
                    bucket.header = Some(header);
                }
            }
            DedupInput::Claim(claim) => {
                let bucket = buckets.entry(claim.task_id.clone()).or_default();
                for pair in pairs_from_claim(&claim) {
                    mentions += u64::from(pair.mention_count);
                    bucket.merge(pair);
                }
            }
            DedupInput::Pair(pair) => {
                let pair = recanonicalize(pair);
                if pair.claim_text.is_empty() {
                    debug!(task_id = %pair.task_id, "Dropping pair with empty claim text");
                    continue;
                }
                let bucket = buckets.entry(pair.task_id.clone()).or_default();
                mentions += u64::from(pair.mention_count);
                bucket.merge(pair);
            }
        }
    }

    let mut output = Vec::new();
    let mut pair_count = 0usize;
    let mut unresolvable = 0usize;
    let task_count = buckets.len();
    for bucket in buckets.into_values() {
        if let Some(header) = bucket.header {
            output.push(PairLine::Task(header));
        }
        for pair in bucket.pairs.into_values() {
            pair_count += 1;
            if !pair.resolvable {
                unresolvable += 1;
            }
            output.push(PairLine::Pair(pair));
        }
    }

    info!(
        tasks = task_count,
        mentions,
        pairs = pair_count,
        unresolvable,
        "Deduplication complete"
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::claim::Source;
    use crate::types::task::Task;
    use std::collections::BTreeMap;

    fn claim(task: &str, position: usize, text: &str, markers: &[&str], refs: &[(&str, &str)]) -> DedupInput {
        let references: BTreeMap<String, Source> = refs
            .iter()
            .map(|(n, url)| (n.to_string(), Source::new(*url)))
            .collect();
        DedupInput::Claim(ClaimRecord {
            task_id: TaskId::new(task),
            position,
            claim_text: text.to_string(),
            citation_markers: markers.iter().map(|m| m.to_string()).collect(),
            references,
        })
    }

    fn header(task: &str) -> DedupInput {
        DedupInput::Task(TaskHeader::extracted(&Task::new(task, "q", "report")))
    }

    fn pairs(lines: &[PairLine]) -> Vec<&PairRecord> {
        lines
            .iter()
            .filter_map(|l| match l {
                PairLine::Pair(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_equivalent_urls_collapse() {
        let refs = [
            ("1", "http://Example.com/a/?utm_source=x"),
            ("2", "https://example.com/a#section"),
        ];
        let lines = deduplicate(vec![
            header("1"),
            claim("1", 1, "GDP grew 3%.", &["[1]"], &refs),
            claim("1", 2, "GDP grew 3% [2]", &["[2]"], &refs),
        ]);

        let pairs = pairs(&lines);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].source_url.as_deref(), Some("https://example.com/a"));
        assert_eq!(pairs[0].mention_count, 2);
        assert_eq!(pairs[0].citation_marker, "1");
    }

    #[test]
    fn test_group_and_range_markers_expand() {
        let refs = [("1", "https://a.com"), ("2", "https://b.com"), ("3", "https://c.com")];
        let lines = deduplicate(vec![claim("1", 1, "Claim", &["[1-3]"], &refs)]);
        let urls: Vec<_> = pairs(&lines)
            .iter()
            .map(|p| p.source_url.clone().unwrap())
            .collect();
        assert_eq!(urls, vec!["https://a.com", "https://b.com", "https://c.com"]);
    }

    #[test]
    fn test_unresolvable_markers_are_kept() {
        let lines = deduplicate(vec![
            header("1"),
            claim("1", 1, "Claim", &["[7]", "see above"], &[]),
        ]);
        let pairs = pairs(&lines);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| !p.resolvable && p.source_url.is_none()));
        assert_eq!(pairs[0].citation_marker, "7");
    }

    #[test]
    fn test_inline_url_marker() {
        let lines = deduplicate(vec![claim(
            "1",
            1,
            "Claim",
            &["https://www.example.org/page/"],
            &[],
        )]);
        let pairs = pairs(&lines);
        assert!(pairs[0].resolvable);
        assert_eq!(pairs[0].source_url.as_deref(), Some("https://www.example.org/page"));
    }

    #[test]
    fn test_uncited_claim_yields_no_pairs_but_header_survives() {
        let lines = deduplicate(vec![header("1"), claim("1", 1, "Claim", &[], &[])]);
        assert_eq!(lines.len(), 1);
        assert!(matches!(lines[0], PairLine::Task(_)));
    }

    #[test]
    fn test_same_source_in_different_tasks_stays_separate() {
        let refs = [("1", "https://a.com")];
        let lines = deduplicate(vec![
            claim("1", 1, "Claim", &["[1]"], &refs),
            claim("2", 1, "Claim", &["[1]"], &refs),
        ]);
        assert_eq!(pairs(&lines).len(), 2);
    }

    #[test]
    fn test_idempotent() {
        let refs = [("1", "http://a.com/x/"), ("2", "https://b.com/?b=2&a=1")];
        let first = deduplicate(vec![
            header("1"),
            claim("1", 1, "“Quoted” claim [1].", &["[1]", "[2]"], &refs),
            claim("1", 2, "\"Quoted\" claim", &["[1]", "[9]"], &refs),
            header("2"),
            claim("2", 1, "Other", &["[2]"], &refs),
        ]);
        let second = deduplicate(first.clone().into_iter().map(DedupInput::from));
        assert_eq!(first, second);
    }

    #[test]
    fn test_first_header_wins() {
        let mut late = TaskHeader::extracted(&Task::new("1", "late", "r"));
        late.claim_count = 99;
        let lines = deduplicate(vec![header("1"), DedupInput::Task(late)]);
        assert_eq!(lines.len(), 1);
        let PairLine::Task(h) = &lines[0] else {
            panic!("expected header");
        };
        assert_eq!(h.query, "q");
    }
}
