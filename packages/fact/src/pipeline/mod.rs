//! The five pipeline stages and the helpers they share.
//!
//! Each stage is a function from the previous stage's records to its own:
//! - [`extract`] - reports to claims (oracle)
//! - [`dedup`] - claims to distinct (claim, source) pairs
//! - [`fetch`] - pairs to one evidence record per source (retriever)
//! - [`validate`] - pairs plus evidence to verdicts (oracle)
//! - [`aggregate`] - verdicts to trust statistics

pub mod aggregate;
pub mod dedup;
pub mod extract;
pub mod fetch;
pub mod prompts;
pub mod report;
pub mod retry;
pub mod validate;

pub use aggregate::{aggregate, corpus_summary, fact_scores, task_stats};
pub use dedup::{deduplicate, pairs_from_claim};
pub use extract::{extract_task, run_extraction, ExtractSummary};
pub use fetch::{distinct_sources, fetch_source, run_fetch, FetchCache};
pub use prompts::{
    format_extract_prompt, format_judge_prompt, parse_claims_reply, parse_judgment_reply,
    EXTRACT_CLAIMS_PROMPT, EXTRACT_CLAIMS_SYSTEM, JUDGE_PROMPT, JUDGE_SYSTEM,
};
pub use report::{clean_report, parse_references};
pub use retry::{with_retry, RetryOutcome, RetryableError};
pub use validate::{check_coverage, run_validation, validate_pair, EvidenceIndex};
