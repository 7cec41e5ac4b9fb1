//! Retrieval Bench - ingestion and NDCG@k benchmarking for a remote
//! multi-modal document-retrieval service.
//!
//! # Overview
//!
//! The benchmark has a write path and a read path that share only a
//! collection name and a backend handle:
//! 1. **Ingestion** uploads page images into a named collection, creating it
//!    if needed and retrying each upsert with a fixed delay
//! 2. **Evaluation** searches every labeled query against the collection,
//!    retrying short or failed searches, and scores the hits with NDCG@k
//! 3. **Reporting** collects one summary row and one score column per dataset
//!
//! # Quick Start
//!
//! ```no_run
//! use retrieval_bench::{
//!     BenchmarkReport, BenchmarkRunner, Catalogue, Config, DataDir, DocumentIngestor,
//!     HttpBackend, RankingEvaluator,
//!     runner::{RunMode, RunOptions},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     let backend = HttpBackend::new(config.backend.clone());
//!     let data = DataDir::new("data");
//!
//!     let runner = BenchmarkRunner::new(
//!         &backend,
//!         &data,
//!         Catalogue::vidore(),
//!         DocumentIngestor::new(config.retry.upsert, true),
//!         RankingEvaluator::new(config.retry.search),
//!         RunOptions {
//!             mode: RunMode::EVALUATE,
//!             top_k: config.top_k,
//!             ..Default::default()
//!         },
//!     );
//!
//!     let report = runner
//!         .run_single(BenchmarkReport::new(), "docvqa_test_subsampled")
//!         .await?;
//!     report.print_summary();
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **RetrievalBackend**: the five capabilities consumed from the service
//! - **DocumentIngestor**: idempotent, resumable collection population
//! - **RankingEvaluator**: retried search, NDCG@k and latency per query
//! - **BenchmarkRunner**: catalogue-wide orchestration into a BenchmarkReport

pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod ingest;
pub mod report;
pub mod retry;
pub mod runner;

// Re-export commonly used types
pub use backend::{HttpBackend, RetrievalBackend, SearchHit, SearchResponse};
pub use config::Config;
pub use dataset::{Catalogue, DataDir, DatasetEntry, DatasetSource, Document, Query};
pub use error::{BenchError, Result};
pub use eval::{EvaluationSummary, RankingEvaluator, RelevancePolicy};
pub use ingest::DocumentIngestor;
pub use report::BenchmarkReport;
pub use retry::RetryPolicy;
pub use runner::BenchmarkRunner;
