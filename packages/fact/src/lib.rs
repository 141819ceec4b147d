//! Citation-grounding verification for AI-generated research reports.
//!
//! Measures whether the claims in a report are backed by the sources it
//! cites. Five stages run in sequence, each reading the previous stage's
//! JSON Lines file and writing its own:
//!
//! 1. **Extractor** - enumerate claims and their citation markers (oracle)
//! 2. **Deduplicator** - canonicalize and collapse (claim, source) pairs
//! 3. **Fetcher** - retrieve every distinct source once
//! 4. **Validator** - judge each pair against its evidence (oracle)
//! 5. **Aggregator** - per-task and corpus trust statistics
//!
//! # Usage
//!
//! ```rust,ignore
//! use fact::pipeline::{run_extraction, deduplicate, run_fetch, run_validation, aggregate};
//! use fact::testing::MockAI;
//! use fact::retrievers::MockRetriever;
//!
//! let ai = MockAI::new();
//! let claims = run_extraction(&tasks, &ai, &ExtractConfig::default()).await;
//! let pairs = deduplicate(claims.into_iter().map(Into::into));
//! let evidence = run_fetch(&pairs, &retriever, &FetchCache::new(), &FetchConfig::default()).await;
//! let verdicts = run_validation(pairs, &EvidenceIndex::new(evidence), &ai, &ValidateConfig::default()).await?;
//! let stats = aggregate(&verdicts, &AggregateConfig::default());
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Oracle and retriever abstractions
//! - [`types`] - Stage records and configuration
//! - [`pipeline`] - The stages and shared retry/prompt helpers
//! - [`canonical`] - URL, claim and marker canonicalization
//! - [`retrievers`] - Retriever implementations and wrappers
//! - [`ai`] - OpenAI-compatible oracle (feature `openai`)
//! - [`security`] - Credential handling and SSRF protection
//! - [`io`] - Stage file reading and writing
//! - [`testing`] - Mock oracle for tests

pub mod ai;
pub mod canonical;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod retrievers;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    FactError, OracleError, OracleResult, Result, RetrieveError, RetrieveResult, Retryability,
    SecurityError,
};
pub use traits::{
    ai::{ExtractedClaim, Judgment, ReportInput, Support, AI},
    retriever::{RawPage, Retriever, ValidatedRetriever},
};
pub use types::{
    claim::{ClaimRecord, ExtractionLine, Source},
    config::{
        AggregateConfig, ExtractConfig, FetchConfig, RetryPolicy, UnverifiablePolicy,
        ValidateConfig,
    },
    evidence::{EvidenceRecord, FetchStatus},
    pair::{DedupInput, PairLine, PairRecord},
    stats::{CorpusSummary, FactScore, LanguageSummary, StatsLine, TaskStats},
    task::{QueryIndex, QueryRecord, Task, TaskHeader, TaskId, TaskStatus},
    verdict::{Verdict, VerdictLine, VerdictRecord},
};

// Re-export pipeline components
pub use pipeline::{
    aggregate, deduplicate, fact_scores, run_extraction, run_fetch, run_validation, EvidenceIndex,
    FetchCache,
};

pub use canonical::{canonicalize_claim, canonicalize_url, parse_marker, MarkerRef};
pub use security::{SecretString, UrlValidator};

// Re-export retrievers
pub use retrievers::{MockRetriever, RateLimitedRetriever};

#[cfg(feature = "jina")]
pub use retrievers::JinaRetriever;

#[cfg(feature = "openai")]
pub use ai::OpenAI;

// Re-export testing utilities
pub use testing::MockAI;
