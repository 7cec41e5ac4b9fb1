//! Retrieval quality evaluation.
//!
//! - [`metrics`]: DCG / NDCG@k and relevance policies
//! - [`evaluator`]: retried search per query, latency tracking, aggregation

pub mod evaluator;
pub mod metrics;

pub use evaluator::{EvaluationRecord, EvaluationSummary, RankingEvaluator};
pub use metrics::{RelevancePolicy, dcg, ndcg, ndcg_at_k};
