//! Query loop: search each query against a collection and score it.

use super::metrics::{RelevancePolicy, mean, ndcg_at_k};
use crate::backend::{RetrievalBackend, SearchResponse};
use crate::dataset::{GroundTruthKey, Query};
use crate::error::{BenchError, Result};
use crate::retry::{RetryPolicy, retry};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub query_text: String,
    /// 0 for failed queries.
    pub ndcg: f64,
    /// Seconds spent in the retried search call. `None` if the query failed.
    pub latency: Option<f64>,
}

/// Aggregate over all queries of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    /// Mean of `ndcg_scores`.
    pub avg_ndcg: f64,
    /// One score per query, in query order.
    pub ndcg_scores: Vec<f64>,
    /// Mean latency over successful queries, 0 if none succeeded.
    pub avg_latency: f64,
    pub failed_queries: usize,
}

impl EvaluationSummary {
    /// Fold per-query records. Only call once every query is processed.
    pub fn from_records(records: &[EvaluationRecord]) -> Self {
        let ndcg_scores: Vec<f64> = records.iter().map(|r| r.ndcg).collect();
        let latencies: Vec<f64> = records.iter().filter_map(|r| r.latency).collect();

        Self {
            avg_ndcg: mean(&ndcg_scores),
            failed_queries: records.len() - latencies.len(),
            avg_latency: mean(&latencies),
            ndcg_scores,
        }
    }
}

/// Scores retrieval quality for a collection against labeled queries.
#[derive(Debug, Clone)]
pub struct RankingEvaluator {
    search_policy: RetryPolicy,
    relevance: RelevancePolicy,
    ground_truth: GroundTruthKey,
}

impl RankingEvaluator {
    pub fn new(search_policy: RetryPolicy) -> Self {
        Self {
            search_policy,
            relevance: RelevancePolicy::default(),
            ground_truth: GroundTruthKey::default(),
        }
    }

    pub fn with_relevance(mut self, relevance: RelevancePolicy) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_ground_truth(mut self, key: GroundTruthKey) -> Self {
        self.ground_truth = key;
        self
    }

    pub fn relevance(&self) -> RelevancePolicy {
        self.relevance
    }

    /// Search, retrying while the backend errors or returns fewer than
    /// `top_k` hits.
    pub async fn search_with_retry<B: RetrievalBackend>(
        &self,
        backend: &B,
        query: &str,
        collection: &str,
        top_k: usize,
    ) -> Result<SearchResponse> {
        retry(&self.search_policy, "search", || async move {
            let response = backend.search(query, collection, top_k).await?;
            if response.results.len() < top_k {
                return Err(BenchError::InsufficientResults {
                    expected: top_k,
                    got: response.results.len(),
                });
            }
            Ok(response)
        })
        .await
    }

    /// Score one query. Failures degrade to NDCG 0 without a latency sample.
    pub async fn evaluate_query<B: RetrievalBackend>(
        &self,
        backend: &B,
        query: &Query,
        collection: &str,
        top_k: usize,
    ) -> EvaluationRecord {
        let start = Instant::now();
        let outcome = self
            .search_with_retry(backend, &query.text, collection, top_k)
            .await;
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Ok(response) => {
                let ndcg = ndcg_at_k(
                    &response.results,
                    &query.ground_truth,
                    &self.ground_truth,
                    top_k,
                    self.relevance,
                );
                debug!(query = %query.text, ndcg, latency = elapsed, "query scored");
                EvaluationRecord {
                    query_text: query.text.clone(),
                    ndcg,
                    latency: Some(elapsed),
                }
            }
            Err(err) => {
                warn!(collection, query = %query.text, error = %err, "query failed, scoring 0");
                EvaluationRecord {
                    query_text: query.text.clone(),
                    ndcg: 0.0,
                    latency: None,
                }
            }
        }
    }

    /// Evaluate every query in order against `collection`.
    pub async fn evaluate<B: RetrievalBackend>(
        &self,
        queries: &[Query],
        backend: &B,
        collection: &str,
        top_k: usize,
    ) -> EvaluationSummary {
        info!(collection, queries = queries.len(), top_k, "evaluating");

        let mut records = Vec::with_capacity(queries.len());
        for query in queries {
            records.push(self.evaluate_query(backend, query, collection, top_k).await);
        }

        let summary = EvaluationSummary::from_records(&records);
        info!(
            collection,
            avg_ndcg = summary.avg_ndcg,
            avg_latency = summary.avg_latency,
            failed = summary.failed_queries,
            "evaluation finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SearchHit;
    use crate::backend::mock::MockBackend;

    fn three_hits() -> Vec<SearchHit> {
        vec![
            SearchHit::new("1", 1.0),
            SearchHit::new("2", 1.0),
            SearchHit::new("3", 1.0),
        ]
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.001
    }

    #[tokio::test]
    async fn test_evaluate_two_queries() {
        let backend = MockBackend::new().with_hits(three_hits());
        let evaluator = RankingEvaluator::new(RetryPolicy::immediate(3));
        let queries = vec![Query::new("query1", "1"), Query::new("query2", "2")];

        let summary = evaluator
            .evaluate(&queries, &backend, "test_collection", 3)
            .await;

        assert!(approx(summary.avg_ndcg, 0.8154));
        assert_eq!(summary.ndcg_scores.len(), 2);
        assert_eq!(summary.ndcg_scores[0], 1.0);
        assert!(approx(summary.ndcg_scores[1], 0.6309));
        assert_eq!(summary.failed_queries, 0);
        assert_eq!(backend.search_calls(), 2);
    }

    #[tokio::test]
    async fn test_short_results_are_retried() {
        let backend = MockBackend::new().with_hits(three_hits());
        backend.script_search(Ok(SearchResponse {
            results: vec![SearchHit::new("1", 1.0)],
        }));
        backend.script_search(Err(BenchError::Http("timeout".to_string())));
        let evaluator = RankingEvaluator::new(RetryPolicy::immediate(3));

        let record = evaluator
            .evaluate_query(&backend, &Query::new("q", "1"), "coll", 3)
            .await;

        assert_eq!(backend.search_calls(), 3);
        assert_eq!(record.ndcg, 1.0);
        assert!(record.latency.is_some());
    }

    #[tokio::test]
    async fn test_exhausted_search_scores_zero() {
        // Only two hits exist, so top_k = 3 never succeeds.
        let backend = MockBackend::new().with_hits(three_hits()[..2].to_vec());
        let evaluator = RankingEvaluator::new(RetryPolicy::immediate(4));

        let err = evaluator
            .search_with_retry(&backend, "q", "coll", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(backend.search_calls(), 4);

        let record = evaluator
            .evaluate_query(&backend, &Query::new("q", "1"), "coll", 3)
            .await;
        assert_eq!(record.ndcg, 0.0);
        assert_eq!(record.latency, None);
    }

    #[tokio::test]
    async fn test_failed_queries_keep_their_slot() {
        let backend = MockBackend::new().with_hits(three_hits());
        // First query: every attempt errors. Second query succeeds.
        backend.script_search(Err(BenchError::Http("boom".to_string())));
        backend.script_search(Err(BenchError::Http("boom".to_string())));
        let evaluator = RankingEvaluator::new(RetryPolicy::immediate(2));
        let queries = vec![Query::new("a", "1"), Query::new("b", "1")];

        let summary = evaluator.evaluate(&queries, &backend, "coll", 3).await;

        assert_eq!(summary.ndcg_scores, vec![0.0, 1.0]);
        assert_eq!(summary.avg_ndcg, 0.5);
        assert_eq!(summary.failed_queries, 1);
    }

    #[tokio::test]
    async fn test_binary_policy_ignores_scores() {
        let backend = MockBackend::new().with_hits(vec![
            SearchHit::new("1", 0.2),
            SearchHit::new("2", 0.0),
        ]);
        let queries = vec![Query::new("q", "2")];

        let raw = RankingEvaluator::new(RetryPolicy::once())
            .evaluate(&queries, &backend, "coll", 2)
            .await;
        assert_eq!(raw.ndcg_scores, vec![0.0]);

        let binary = RankingEvaluator::new(RetryPolicy::once())
            .with_relevance(RelevancePolicy::Binary)
            .evaluate(&queries, &backend, "coll", 2)
            .await;
        assert!(approx(binary.ndcg_scores[0], 0.6309));
    }

    #[test]
    fn test_summary_latency_excludes_failures() {
        let records = vec![
            EvaluationRecord {
                query_text: "a".to_string(),
                ndcg: 1.0,
                latency: Some(0.2),
            },
            EvaluationRecord {
                query_text: "b".to_string(),
                ndcg: 0.0,
                latency: None,
            },
            EvaluationRecord {
                query_text: "c".to_string(),
                ndcg: 0.5,
                latency: Some(0.4),
            },
        ];
        let summary = EvaluationSummary::from_records(&records);
        assert!(approx(summary.avg_latency, 0.3));
        assert!(approx(summary.avg_ndcg, 0.5));
        assert_eq!(summary.failed_queries, 1);
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = EvaluationSummary::from_records(&[]);
        assert_eq!(summary.avg_ndcg, 0.0);
        assert_eq!(summary.avg_latency, 0.0);
        assert!(summary.ndcg_scores.is_empty());
    }
}
