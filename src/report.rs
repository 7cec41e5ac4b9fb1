//! Benchmark report: one summary row and one score column per dataset.

use crate::error::{BenchError, Result};
use crate::eval::EvaluationSummary;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Summary statistics for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub dataset: String,
    pub avg_ndcg_score: f64,
    /// Seconds.
    pub avg_latency: f64,
    pub num_docs: usize,
}

/// Per-query NDCG scores of one dataset, in query order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailColumn {
    pub dataset: String,
    pub scores: Vec<f64>,
}

/// A dataset that was skipped because it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetFailure {
    pub dataset: String,
    pub collection: String,
    pub error: String,
}

/// Column-per-dataset view of the detail scores, padded to equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailTable {
    pub columns: Vec<String>,
    /// `None` marks a missing value in a shorter column.
    pub rows: Vec<Vec<Option<f64>>>,
}

/// Accumulated results of a benchmark run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub summary: Vec<SummaryRow>,
    pub details: Vec<DetailColumn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DatasetFailure>,
}

impl BenchmarkReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the results of one dataset.
    pub fn record(&mut self, dataset: &str, evaluation: &EvaluationSummary, num_docs: usize) {
        let row = SummaryRow {
            dataset: dataset.to_string(),
            avg_ndcg_score: evaluation.avg_ndcg,
            avg_latency: evaluation.avg_latency,
            num_docs,
        };
        let column = DetailColumn {
            dataset: dataset.to_string(),
            scores: evaluation.ndcg_scores.clone(),
        };

        match self.summary.iter_mut().find(|r| r.dataset == dataset) {
            Some(existing) => *existing = row,
            None => self.summary.push(row),
        }
        match self.details.iter_mut().find(|c| c.dataset == dataset) {
            Some(existing) => *existing = column,
            None => self.details.push(column),
        }
    }

    pub fn record_failure(&mut self, dataset: &str, collection: &str, error: &BenchError) {
        self.failures.push(DatasetFailure {
            dataset: dataset.to_string(),
            collection: collection.to_string(),
            error: error.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.failures.is_empty()
    }

    /// Build the padded detail table.
    pub fn detail_table(&self) -> DetailTable {
        let len = self
            .details
            .iter()
            .map(|c| c.scores.len())
            .max()
            .unwrap_or(0);

        let rows = (0..len)
            .map(|i| {
                self.details
                    .iter()
                    .map(|c| c.scores.get(i).copied())
                    .collect()
            })
            .collect();

        DetailTable {
            columns: self.details.iter().map(|c| c.dataset.clone()).collect(),
            rows,
        }
    }

    /// Save summary, padded detail table and failures as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        #[derive(Serialize)]
        struct Output<'a> {
            summary: &'a [SummaryRow],
            details: DetailTable,
            failures: &'a [DatasetFailure],
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| BenchError::io(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(&Output {
            summary: &self.summary,
            details: self.detail_table(),
            failures: &self.failures,
        })?;
        fs::write(path, json).map_err(|e| BenchError::io(path, e))
    }

    /// Print summary to stdout.
    pub fn print_summary(&self) {
        println!("\n================ Benchmark Results ================");
        println!(
            "{:<45} {:>8} {:>10} {:>6}",
            "Dataset", "NDCG", "Latency", "Docs"
        );
        println!("{}", "─".repeat(72));
        for row in &self.summary {
            println!(
                "{:<45} {:>8.4} {:>9.2}s {:>6}",
                row.dataset, row.avg_ndcg_score, row.avg_latency, row.num_docs
            );
        }
        if !self.failures.is_empty() {
            println!("{}", "─".repeat(72));
            for failure in &self.failures {
                println!("FAILED {} ({}): {}", failure.dataset, failure.collection, failure.error);
            }
        }
        println!("===================================================\n");
    }
}
