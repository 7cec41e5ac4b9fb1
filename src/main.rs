//! Retrieval Bench CLI
//!
//! Upload benchmark datasets into a retrieval service and score its
//! ranking quality with NDCG@k.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use retrieval_bench::{
    BenchmarkReport, BenchmarkRunner, Catalogue, Config, DataDir, DocumentIngestor, HttpBackend,
    RankingEvaluator, RelevancePolicy, RetrievalBackend,
    runner::{DatasetFailurePolicy, RunMode, RunOptions},
};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Retrieval Bench - NDCG@k benchmarking for document-retrieval services
#[derive(Parser)]
#[command(name = "retrieval-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding documents/<dataset>.json and queries/<dataset>.json
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Run over every catalogue dataset, or over one collection.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Process every dataset in the catalogue
    #[arg(long)]
    all: bool,

    /// Process only the dataset mapped to this collection
    #[arg(long)]
    collection: Option<String>,
}

/// Upload every catalogue dataset, or one dataset by name.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct UpsertTarget {
    /// Upload every dataset in the catalogue
    #[arg(long)]
    all: bool,

    /// Upload only this dataset
    #[arg(long)]
    dataset: Option<String>,
}

/// Largest row count a combined upsert-and-evaluate run accepts.
const MAX_RUN_ROWS: usize = 500;

#[derive(Subcommand)]
enum Commands {
    /// Upload dataset documents into their collections
    Upsert {
        #[command(flatten)]
        target: UpsertTarget,

        /// Upload into this collection instead of the dataset's default
        #[arg(long, requires = "dataset")]
        collection: Option<String>,

        /// Resume from this document offset (single dataset only)
        #[arg(long, default_value_t = 0, conflicts_with = "all")]
        start_index: usize,

        /// Number of rows to load per dataset (all if omitted)
        #[arg(long)]
        n_rows: Option<usize>,

        /// Don't wait for the backend to finish processing each document
        #[arg(long)]
        async_writes: bool,
    },

    /// Score retrieval quality against labeled queries
    Evaluate {
        #[command(flatten)]
        target: Target,

        /// Number of rows to load per dataset (all if omitted)
        #[arg(long)]
        n_rows: Option<usize>,

        /// Rank cutoff for NDCG@k (defaults to the configured value)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Score matches as 1 instead of the backend's raw score
        #[arg(long)]
        binary_relevance: bool,

        /// Record failing datasets in the report instead of stopping
        #[arg(long)]
        skip_failed: bool,

        /// Save the report to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload then score each dataset in one pass
    Run {
        #[command(flatten)]
        target: Target,

        /// Number of rows to load per dataset (capped at 500)
        #[arg(long, default_value_t = MAX_RUN_ROWS)]
        n_rows: usize,

        /// Rank cutoff for NDCG@k (defaults to the configured value)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Save the report to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Test backend connection and credentials
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Upsert {
            target,
            collection,
            start_index,
            n_rows,
            async_writes,
        } => {
            cmd_upsert(
                cli.data_dir,
                target,
                collection,
                start_index,
                n_rows,
                !async_writes,
            )
            .await
        }
        Commands::Evaluate {
            target,
            n_rows,
            top_k,
            binary_relevance,
            skip_failed,
            output,
        } => {
            let relevance = if binary_relevance {
                RelevancePolicy::Binary
            } else {
                RelevancePolicy::RawScore
            };
            let on_failure = if skip_failed {
                DatasetFailurePolicy::SkipAndContinue
            } else {
                DatasetFailurePolicy::Abort
            };
            cmd_evaluate(
                cli.data_dir,
                target,
                n_rows,
                top_k,
                relevance,
                on_failure,
                output,
            )
            .await
        }
        Commands::Run {
            target,
            n_rows,
            top_k,
            output,
        } => cmd_run(cli.data_dir, target, n_rows, top_k, output).await,
        Commands::Test => cmd_test().await,
    }
}

fn load_config() -> Result<Config> {
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(
    runner: &BenchmarkRunner<'_, HttpBackend, DataDir>,
    target: &Target,
) -> Result<BenchmarkReport> {
    let report = BenchmarkReport::new();
    match (&target.collection, target.all) {
        (Some(collection), _) => {
            println!("Processing collection {}...", collection);
            Ok(runner.run_single(report, collection).await?)
        }
        (None, true) => {
            println!("Processing {} datasets...", runner.catalogue().len());
            Ok(runner.run_all(report).await?)
        }
        (None, false) => anyhow::bail!("Please specify --all or --collection <name>."),
    }
}

async fn cmd_upsert(
    data_dir: PathBuf,
    target: UpsertTarget,
    collection: Option<String>,
    start_index: usize,
    n_rows: Option<usize>,
    synchronous: bool,
) -> Result<()> {
    let config = load_config()?;
    let backend = HttpBackend::new(config.backend.clone());
    let data = DataDir::new(data_dir);

    let runner = BenchmarkRunner::new(
        &backend,
        &data,
        Catalogue::vidore(),
        DocumentIngestor::new(config.retry.upsert, synchronous),
        RankingEvaluator::new(config.retry.search),
        RunOptions {
            mode: RunMode::INGEST,
            top_k: config.top_k,
            max_rows: n_rows,
            start_index,
            on_failure: DatasetFailurePolicy::Abort,
        },
    );

    let start = Instant::now();
    let result = match (&target.dataset, target.all) {
        (Some(dataset), _) => {
            println!(
                "Processing {} with collection {}...",
                dataset,
                collection.as_deref().unwrap_or("(default)")
            );
            runner
                .run_dataset(BenchmarkReport::new(), dataset, collection.as_deref())
                .await
        }
        (None, true) => {
            println!("Processing {} datasets...", runner.catalogue().len());
            runner.run_all(BenchmarkReport::new()).await
        }
        (None, false) => anyhow::bail!("Please specify --all or --dataset <name>."),
    };
    result.context("Ingestion failed (rerun with --start-index to resume)")?;

    println!("Upsert finished in {:.2?}", start.elapsed());
    Ok(())
}

async fn cmd_evaluate(
    data_dir: PathBuf,
    target: Target,
    n_rows: Option<usize>,
    top_k: Option<usize>,
    relevance: RelevancePolicy,
    on_failure: DatasetFailurePolicy,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;
    let top_k = top_k.unwrap_or(config.top_k);
    if top_k == 0 {
        anyhow::bail!("--top-k must be at least 1");
    }

    let backend = HttpBackend::new(config.backend.clone());
    let data = DataDir::new(data_dir);

    let runner = BenchmarkRunner::new(
        &backend,
        &data,
        Catalogue::vidore(),
        DocumentIngestor::new(config.retry.upsert, true),
        RankingEvaluator::new(config.retry.search).with_relevance(relevance),
        RunOptions {
            mode: RunMode::EVALUATE,
            top_k,
            max_rows: n_rows,
            start_index: 0,
            on_failure,
        },
    );

    println!("Using backend: {}", config.backend.api_base);
    println!(
        "Scoring NDCG@{} ({:?} relevance)",
        top_k,
        runner.evaluator().relevance()
    );

    let start = Instant::now();
    let report = run(&runner, &target).await.context("Evaluation failed")?;
    finish(&report, start, output)
}

async fn cmd_run(
    data_dir: PathBuf,
    target: Target,
    n_rows: usize,
    top_k: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    if n_rows > MAX_RUN_ROWS {
        println!(
            "n_rows exceeds the maximum limit of {}. Setting n_rows to {}.",
            MAX_RUN_ROWS, MAX_RUN_ROWS
        );
    }
    let n_rows = n_rows.min(MAX_RUN_ROWS);

    let config = load_config()?;
    let top_k = top_k.unwrap_or(config.top_k);
    if top_k == 0 {
        anyhow::bail!("--top-k must be at least 1");
    }

    let backend = HttpBackend::new(config.backend.clone());
    let data = DataDir::new(data_dir);

    let runner = BenchmarkRunner::new(
        &backend,
        &data,
        Catalogue::vidore(),
        DocumentIngestor::new(config.retry.upsert, true),
        RankingEvaluator::new(config.retry.search),
        RunOptions {
            mode: RunMode::FULL,
            top_k,
            max_rows: Some(n_rows),
            start_index: 0,
            on_failure: DatasetFailurePolicy::Abort,
        },
    );

    println!("Using backend: {}", config.backend.api_base);
    println!("Upserting {} rows per dataset, scoring NDCG@{}", n_rows, top_k);

    let start = Instant::now();
    let report = run(&runner, &target).await.context("Benchmark run failed")?;
    finish(&report, start, output)
}

fn finish(report: &BenchmarkReport, start: Instant, output: Option<PathBuf>) -> Result<()> {
    if report.is_empty() {
        println!("No datasets were scored.");
    } else {
        report.print_summary();
    }
    println!("Total time: {:.1}s", start.elapsed().as_secs_f64());

    if let Some(output_path) = output {
        report
            .save_json(&output_path)
            .context("Failed to save report")?;
        println!("Results saved to {:?}", output_path);
    }

    Ok(())
}

async fn cmd_test() -> Result<()> {
    println!("Testing backend connection...\n");

    let config = Config::load().context("Failed to load configuration")?;

    println!("Configuration:");
    println!("  API Base:  {}", config.backend.api_base);
    println!(
        "  API Key:   {}...",
        config.backend.api_key.chars().take(8).collect::<String>()
    );
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let backend = HttpBackend::new(config.backend);

    println!("Listing collections...");
    match backend.list_collections().await {
        Ok(collections) => {
            println!("Connection successful! {} collections:", collections.len());
            for collection in collections {
                println!("  - {}", collection.name);
            }
        }
        Err(e) => {
            println!("Connection failed: {}", e);
        }
    }

    Ok(())
}
