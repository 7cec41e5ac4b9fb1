//! Orchestration across the dataset catalogue.

use crate::backend::RetrievalBackend;
use crate::dataset::{Catalogue, DatasetEntry, DatasetSource};
use crate::error::{BenchError, Result};
use crate::eval::RankingEvaluator;
use crate::ingest::DocumentIngestor;
use crate::report::BenchmarkReport;
use tracing::{error, info};

/// Which halves of the pipeline to run for each dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMode {
    pub ingest: bool,
    pub evaluate: bool,
}

impl RunMode {
    pub const INGEST: RunMode = RunMode {
        ingest: true,
        evaluate: false,
    };
    pub const EVALUATE: RunMode = RunMode {
        ingest: false,
        evaluate: true,
    };
    pub const FULL: RunMode = RunMode {
        ingest: true,
        evaluate: true,
    };
}

/// What `run_all` does when one dataset fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatasetFailurePolicy {
    /// Stop the run and return the error.
    #[default]
    Abort,
    /// Record the failure in the report and move on to the next dataset.
    SkipAndContinue,
}

/// Options for a benchmark run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Rank cutoff for NDCG@k.
    pub top_k: usize,
    /// Limit documents and queries per dataset.
    pub max_rows: Option<usize>,
    /// Document offset to resume ingestion from.
    pub start_index: usize,
    pub on_failure: DatasetFailurePolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::EVALUATE,
            top_k: 5,
            max_rows: None,
            start_index: 0,
            on_failure: DatasetFailurePolicy::default(),
        }
    }
}

/// Drives ingestion and evaluation over a catalogue of datasets.
pub struct BenchmarkRunner<'a, B, S> {
    backend: &'a B,
    source: &'a S,
    catalogue: Catalogue,
    ingestor: DocumentIngestor,
    evaluator: RankingEvaluator,
    options: RunOptions,
}

impl<'a, B: RetrievalBackend, S: DatasetSource> BenchmarkRunner<'a, B, S> {
    /// Create a new benchmark runner.
    pub fn new(
        backend: &'a B,
        source: &'a S,
        catalogue: Catalogue,
        ingestor: DocumentIngestor,
        evaluator: RankingEvaluator,
        options: RunOptions,
    ) -> Self {
        Self {
            backend,
            source,
            catalogue,
            ingestor,
            evaluator,
            options,
        }
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn evaluator(&self) -> &RankingEvaluator {
        &self.evaluator
    }

    /// Check credentials and connectivity with one cheap call.
    pub async fn validate_backend(&self) -> Result<()> {
        self.backend
            .list_collections()
            .await
            .map(|_| ())
            .map_err(|e| BenchError::Connection(e.to_string()))
    }

    /// Process every catalogue entry in order.
    ///
    /// A resume offset only makes sense for one collection, so a non-zero
    /// `start_index` is rejected here.
    pub async fn run_all(&self, mut report: BenchmarkReport) -> Result<BenchmarkReport> {
        if self.options.start_index != 0 {
            return Err(BenchError::Config(format!(
                "start_index {} applies to a single dataset, not to a full catalogue run",
                self.options.start_index
            )));
        }
        self.validate_backend().await?;

        for entry in &self.catalogue.entries {
            info!(dataset = %entry.name, collection = %entry.collection, "processing dataset");
            if let Err(err) = self.process_dataset(entry, &mut report).await {
                match self.options.on_failure {
                    DatasetFailurePolicy::Abort => return Err(err),
                    DatasetFailurePolicy::SkipAndContinue => {
                        error!(dataset = %entry.name, error = %err, "dataset failed, skipping");
                        report.record_failure(&entry.name, &entry.collection, &err);
                    }
                }
            }
        }

        Ok(report)
    }

    /// Process the dataset mapped to `collection`.
    ///
    /// An unknown collection is rejected before any backend call.
    pub async fn run_single(
        &self,
        mut report: BenchmarkReport,
        collection: &str,
    ) -> Result<BenchmarkReport> {
        let entry = self.catalogue.require(collection)?;
        self.validate_backend().await?;

        info!(dataset = %entry.name, collection = %entry.collection, "processing dataset");
        self.process_dataset(entry, &mut report).await?;
        Ok(report)
    }

    /// Process the dataset named `dataset`, optionally against a collection
    /// other than its catalogue default.
    pub async fn run_dataset(
        &self,
        mut report: BenchmarkReport,
        dataset: &str,
        collection: Option<&str>,
    ) -> Result<BenchmarkReport> {
        let mut entry = self.catalogue.require_dataset(dataset)?.clone();
        if let Some(collection) = collection {
            entry = entry.with_collection(collection);
        }
        self.validate_backend().await?;

        info!(dataset = %entry.name, collection = %entry.collection, "processing dataset");
        self.process_dataset(&entry, &mut report).await?;
        Ok(report)
    }

    async fn process_dataset(&self, entry: &DatasetEntry, report: &mut BenchmarkReport) -> Result<()> {
        let mut doc_count = None;

        if self.options.mode.ingest {
            let documents = self.source.documents(entry, self.options.max_rows)?;
            let listing = self
                .ingestor
                .upsert_batch(
                    self.backend,
                    &documents,
                    &entry.collection,
                    self.options.start_index,
                )
                .await?;
            info!(
                collection = %entry.collection,
                documents = listing.len(),
                "collection populated"
            );
            doc_count = Some(listing.len());
        }

        if self.options.mode.evaluate {
            let queries = self.source.queries(entry, self.options.max_rows)?;
            let evaluator = self
                .evaluator
                .clone()
                .with_ground_truth(entry.ground_truth.clone());
            let summary = evaluator
                .evaluate(&queries, self.backend, &entry.collection, self.options.top_k)
                .await;

            let num_docs = match doc_count {
                Some(n) => n,
                None => self.backend.list_documents(&entry.collection).await?.len(),
            };
            report.record(&entry.name, &summary, num_docs);
        }

        Ok(())
    }
}
