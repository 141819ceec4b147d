//! Stage commands: read the stage input, run the library stage, write the
//! stage output.

use anyhow::{Context, Result};
use fact::io::{read_jsonl, write_json, write_jsonl};
use fact::pipeline::{check_coverage, ExtractSummary};
use fact::{
    aggregate as aggregate_verdicts, deduplicate, fact_scores, run_extraction, run_fetch,
    run_validation, AggregateConfig, DedupInput, EvidenceIndex, EvidenceRecord, ExtractConfig,
    ExtractionLine, FetchCache, FetchConfig, PairLine, QueryIndex, QueryRecord, Retriever,
    StatsLine, Task, ValidateConfig, VerdictLine, AI,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{OracleConfig, RetrieverConfig};
use crate::{AggregateArgs, FetchArgs, StageArgs};

fn load_query_index(path: Option<&Path>) -> Result<QueryIndex> {
    let Some(path) = path else {
        return Ok(QueryIndex::default());
    };
    let records: Vec<QueryRecord> =
        read_jsonl(path).with_context(|| format!("Failed to read query data {}", path.display()))?;
    let index = QueryIndex::new(records);
    info!(path = %path.display(), tasks = index.len(), "Loaded query data");
    Ok(index)
}

fn read_stage<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    read_jsonl(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_stage<T: serde::Serialize>(path: &Path, records: &[T]) -> Result<()> {
    write_jsonl(path, records).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), records = records.len(), "Wrote stage output");
    Ok(())
}

fn seed_cache(cache: &FetchCache, reuse: Option<&Path>) -> Result<()> {
    let Some(path) = reuse else {
        return Ok(());
    };
    if !path.exists() {
        warn!(path = %path.display(), "Reuse file not found, fetching every source");
        return Ok(());
    }
    let previous: Vec<EvidenceRecord> = read_stage(path)?;
    let seeded = cache.seed(previous);
    info!(path = %path.display(), reused = seeded, "Seeded fetch cache");
    Ok(())
}

async fn extract_tasks<A: AI + ?Sized>(
    mut tasks: Vec<Task>,
    queries: &QueryIndex,
    ai: &A,
    config: &ExtractConfig,
) -> Vec<ExtractionLine> {
    for task in &mut tasks {
        queries.fill_task(task);
    }
    run_extraction(&tasks, ai, config).await
}

fn dedup_lines(lines: Vec<DedupInput>, queries: &QueryIndex) -> Vec<PairLine> {
    let mut pairs = deduplicate(lines);
    fill_pair_headers(&mut pairs, queries);
    pairs
}

fn fill_pair_headers(pairs: &mut [PairLine], queries: &QueryIndex) {
    for line in pairs {
        if let PairLine::Task(header) = line {
            queries.fill_header(header);
        }
    }
}

fn aggregate_lines(
    mut verdicts: Vec<VerdictLine>,
    queries: &QueryIndex,
    config: &AggregateConfig,
) -> Vec<StatsLine> {
    for line in &mut verdicts {
        if let VerdictLine::Task(header) = line {
            queries.fill_header(header);
        }
    }
    aggregate_verdicts(&verdicts, config)
}

fn write_scores(path: Option<&Path>, stats: &[StatsLine]) -> Result<()> {
    if let Some(path) = path {
        let scores = fact_scores(stats);
        write_json(path, &scores).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), tasks = scores.len(), "Wrote scores");
    }
    Ok(())
}

async fn fetch_sources<R: Retriever + ?Sized>(
    pairs: &[PairLine],
    retriever: &R,
    reuse: Option<&Path>,
    config: &FetchConfig,
) -> Result<Vec<EvidenceRecord>> {
    let cache = FetchCache::new();
    seed_cache(&cache, reuse)?;
    Ok(run_fetch(pairs, retriever, &cache, config).await)
}

pub async fn extract(stage: &StageArgs, config: &ExtractConfig) -> Result<()> {
    let tasks: Vec<Task> = read_stage(&stage.input)?;
    let queries = load_query_index(stage.query_data.as_deref())?;
    let ai = OracleConfig::from_env()
        .context("Failed to load oracle configuration")?
        .client();

    let lines = extract_tasks(tasks, &queries, &ai, config).await;
    write_stage(&stage.output, &lines)
}

pub fn dedup(stage: &StageArgs) -> Result<()> {
    let lines: Vec<DedupInput> = read_stage(&stage.input)?;
    let queries = load_query_index(stage.query_data.as_deref())?;
    write_stage(&stage.output, &dedup_lines(lines, &queries))
}

pub async fn fetch(stage: &StageArgs, args: &FetchArgs, config: &FetchConfig) -> Result<()> {
    let pairs: Vec<PairLine> = read_stage(&stage.input)?;
    if let Some(path) = &stage.query_data {
        warn!(path = %path.display(), "Evidence records carry no task headers, ignoring query data");
    }
    let retriever = RetrieverConfig::from_env()
        .context("Failed to load retrieval configuration")?
        .retriever(args.requests_per_second)?;

    let evidence = fetch_sources(&pairs, &retriever, args.reuse.as_deref(), config).await?;
    write_stage(&stage.output, &evidence)
}

pub async fn validate(stage: &StageArgs, evidence: &Path, config: &ValidateConfig) -> Result<()> {
    let mut pairs: Vec<PairLine> = read_stage(&stage.input)?;
    let queries = load_query_index(stage.query_data.as_deref())?;
    fill_pair_headers(&mut pairs, &queries);
    let evidence = EvidenceIndex::new(read_stage::<EvidenceRecord>(evidence)?);
    check_coverage(&pairs, &evidence).context("Evidence file does not cover the pair file")?;
    let ai = OracleConfig::from_env()
        .context("Failed to load oracle configuration")?
        .client();

    let verdicts = run_validation(pairs, &evidence, &ai, config).await?;
    write_stage(&stage.output, &verdicts)
}

pub fn aggregate(stage: &StageArgs, args: &AggregateArgs) -> Result<()> {
    let verdicts: Vec<VerdictLine> = read_stage(&stage.input)?;
    let queries = load_query_index(stage.query_data.as_deref())?;

    let stats = aggregate_lines(verdicts, &queries, &args.config());
    write_stage(&stage.output, &stats)?;
    write_scores(args.scores_json.as_deref(), &stats)
}

/// Everything `fact run` needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub input: PathBuf,
    pub work_dir: PathBuf,
    pub query_data: Option<PathBuf>,
    pub extract: ExtractConfig,
    pub fetch: FetchConfig,
    pub requests_per_second: u32,
    pub reuse: Option<PathBuf>,
    pub validate: ValidateConfig,
    pub aggregate: AggregateConfig,
    pub scores_json: Option<PathBuf>,
}

impl RunPlan {
    fn stage_file(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}

/// Run every stage in process, writing each stage file as a checkpoint.
pub async fn run(plan: &RunPlan) -> Result<()> {
    let tasks: Vec<Task> = read_stage(&plan.input)?;
    let queries = load_query_index(plan.query_data.as_deref())?;
    let ai = OracleConfig::from_env()
        .context("Failed to load oracle configuration")?
        .client();
    let retriever = RetrieverConfig::from_env()
        .context("Failed to load retrieval configuration")?
        .retriever(plan.requests_per_second)?;
    std::fs::create_dir_all(&plan.work_dir)
        .with_context(|| format!("Failed to create {}", plan.work_dir.display()))?;

    info!(tasks = tasks.len(), work_dir = %plan.work_dir.display(), "Starting pipeline run");

    let claims = extract_tasks(tasks, &queries, &ai, &plan.extract).await;
    write_stage(&plan.stage_file("claims.jsonl"), &claims)?;
    let extracted = ExtractSummary::from_lines(&claims);

    let pairs = dedup_lines(claims.into_iter().map(DedupInput::from).collect(), &queries);
    write_stage(&plan.stage_file("pairs.jsonl"), &pairs)?;

    let evidence = fetch_sources(&pairs, &retriever, plan.reuse.as_deref(), &plan.fetch).await?;
    write_stage(&plan.stage_file("evidence.jsonl"), &evidence)?;

    let index = EvidenceIndex::new(evidence);
    let verdicts = run_validation(pairs, &index, &ai, &plan.validate).await?;
    write_stage(&plan.stage_file("verdicts.jsonl"), &verdicts)?;

    let stats = aggregate_lines(verdicts, &queries, &plan.aggregate);
    write_stage(&plan.stage_file("stats.jsonl"), &stats)?;
    write_scores(plan.scores_json.as_deref(), &stats)?;

    info!(
        tasks = extracted.tasks,
        failed_extractions = extracted.failed,
        claims = extracted.claims,
        "Pipeline run complete"
    );
    Ok(())
}
