//! `fact` - run the citation-grounding pipeline stage by stage or end to end.
//!
//! Logs go to stderr (`RUST_LOG`, default `info,fact=debug`). A `.env` file
//! in the working directory is loaded if present.

mod config;
mod stages;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fact::{
    AggregateConfig, ExtractConfig, FetchConfig, RetryPolicy, UnverifiablePolicy, ValidateConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fact")]
#[command(version, about = "Check whether research reports are backed by the sources they cite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract claims and citation markers from reports
    Extract {
        #[command(flatten)]
        stage: StageArgs,
        #[command(flatten)]
        retry: RetryArgs,
    },

    /// Canonicalize and collapse (claim, source) pairs
    Dedup {
        #[command(flatten)]
        stage: StageArgs,
    },

    /// Retrieve every distinct source once
    Fetch {
        #[command(flatten)]
        stage: StageArgs,
        #[command(flatten)]
        retry: RetryArgs,
        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Judge each pair against its source's evidence
    Validate {
        #[command(flatten)]
        stage: StageArgs,
        /// Fetcher output covering every resolvable source
        #[arg(long)]
        evidence: PathBuf,
        #[command(flatten)]
        retry: RetryArgs,
        #[command(flatten)]
        validate: ValidateArgs,
    },

    /// Compute per-task and corpus trust statistics
    Aggregate {
        #[command(flatten)]
        stage: StageArgs,
        #[command(flatten)]
        aggregate: AggregateArgs,
    },

    /// Run every stage, keeping each stage file in the work directory
    Run {
        /// Task file (JSONL)
        #[arg(long)]
        input: PathBuf,
        /// Directory for stage files
        #[arg(long)]
        work_dir: PathBuf,
        /// Query data used to fill missing query text and language
        #[arg(long)]
        query_data: Option<PathBuf>,
        #[arg(long, env = "FACT_WORKERS", default_value_t = 4)]
        workers: usize,
        #[command(flatten)]
        retry: RetryArgs,
        #[command(flatten)]
        fetch: FetchArgs,
        #[command(flatten)]
        validate: ValidateArgs,
        #[command(flatten)]
        aggregate: AggregateArgs,
    },
}

/// Options shared by every stage.
#[derive(Args, Debug, Clone)]
pub struct StageArgs {
    /// Stage input file (JSONL)
    #[arg(long)]
    pub input: PathBuf,

    /// Stage output file (JSONL)
    #[arg(long)]
    pub output: PathBuf,

    /// Query data used to fill missing query text and language
    #[arg(long)]
    pub query_data: Option<PathBuf>,

    /// Units processed concurrently
    #[arg(long, env = "FACT_WORKERS", default_value_t = 4)]
    pub workers: usize,
}

/// Retry budget for oracle and retrieval calls.
#[derive(Args, Debug, Clone)]
pub struct RetryArgs {
    /// Attempts per call, including the first
    #[arg(long, env = "FACT_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Backoff before the first retry; doubles on each further retry
    #[arg(long, env = "FACT_BASE_DELAY_MS", default_value_t = 1000)]
    pub base_delay_ms: u64,

    /// Backoff ceiling
    #[arg(long, env = "FACT_MAX_DELAY_MS", default_value_t = 30_000)]
    pub max_delay_ms: u64,

    /// Timeout for a single call
    #[arg(long, env = "FACT_CALL_TIMEOUT_SECS", default_value_t = 120)]
    pub call_timeout_secs: u64,
}

impl RetryArgs {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_call_timeout(Duration::from_secs(self.call_timeout_secs))
    }
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Retrieval quota
    #[arg(long, env = "FACT_REQUESTS_PER_SECOND", default_value_t = 5)]
    pub requests_per_second: u32,

    /// Pause each worker takes after a source
    #[arg(long, env = "FACT_FETCH_DELAY_MS", default_value_t = 0)]
    pub delay_ms: u64,

    /// Earlier evidence file; its `ok` sources are not fetched again
    #[arg(long)]
    pub reuse: Option<PathBuf>,
}

impl FetchArgs {
    pub fn config(&self, workers: usize, retry: RetryPolicy) -> FetchConfig {
        FetchConfig::default()
            .with_workers(workers)
            .with_delay(Duration::from_millis(self.delay_ms))
            .with_retry(retry)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Evidence characters sent to the oracle per pair
    #[arg(long, env = "FACT_MAX_EVIDENCE_CHARS", default_value_t = 40_000)]
    pub max_evidence_chars: usize,
}

impl ValidateArgs {
    pub fn config(&self, workers: usize, retry: RetryPolicy) -> ValidateConfig {
        ValidateConfig::default()
            .with_workers(workers)
            .with_max_evidence_chars(self.max_evidence_chars)
            .with_retry(retry)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Leave unverifiable pairs out of accuracy
    Exclude,
    /// Count unverifiable and unresolvable pairs as unsupported
    CountAsUnsupported,
}

impl From<PolicyArg> for UnverifiablePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Exclude => Self::Exclude,
            PolicyArg::CountAsUnsupported => Self::CountAsUnsupported,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AggregateArgs {
    #[arg(long, value_enum, env = "FACT_UNVERIFIABLE_POLICY", default_value_t = PolicyArg::Exclude)]
    pub unverifiable_policy: PolicyArg,

    /// Also write per-task scores as a JSON array
    #[arg(long)]
    pub scores_json: Option<PathBuf>,
}

impl AggregateArgs {
    pub fn config(&self) -> AggregateConfig {
        AggregateConfig::default().with_unverifiable_policy(self.unverifiable_policy.into())
    }
}

fn extract_config(workers: usize, retry: &RetryArgs) -> ExtractConfig {
    ExtractConfig::default()
        .with_workers(workers)
        .with_retry(retry.policy())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fact=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract { stage, retry } => {
            stages::extract(&stage, &extract_config(stage.workers, &retry)).await
        }
        Commands::Dedup { stage } => stages::dedup(&stage),
        Commands::Fetch {
            stage,
            retry,
            fetch,
        } => {
            let config = fetch.config(stage.workers, retry.policy());
            stages::fetch(&stage, &fetch, &config).await
        }
        Commands::Validate {
            stage,
            evidence,
            retry,
            validate,
        } => {
            let config = validate.config(stage.workers, retry.policy());
            stages::validate(&stage, &evidence, &config).await
        }
        Commands::Aggregate { stage, aggregate } => stages::aggregate(&stage, &aggregate),
        Commands::Run {
            input,
            work_dir,
            query_data,
            workers,
            retry,
            fetch,
            validate,
            aggregate,
        } => {
            let plan = stages::RunPlan {
                input,
                work_dir,
                query_data,
                extract: extract_config(workers, &retry),
                fetch: fetch.config(workers, retry.policy()),
                requests_per_second: fetch.requests_per_second,
                reuse: fetch.reuse.clone(),
                validate: validate.config(workers, retry.policy()),
                aggregate: aggregate.config(),
                scores_json: aggregate.scores_json.clone(),
            };
            stages::run(&plan).await
        }
    }
}
