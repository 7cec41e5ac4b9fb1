//! Ranking metrics: DCG and NDCG@k over backend search hits.
//!
//! ```text
//! DCG    = Σ rel_i / log2(i + 2)      for rank i = 0..k-1
//! IDCG   = DCG of rel sorted descending (1 for an empty list)
//! NDCG@k = DCG / IDCG                 (0 when IDCG is 0)
//! ```

use crate::backend::SearchHit;
use crate::dataset::GroundTruthKey;
use serde::{Deserialize, Serialize};

/// How much a matching hit contributes to DCG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelevancePolicy {
    /// The hit's own `raw_score`, keeping the backend's confidence signal.
    #[default]
    RawScore,
    /// 1 for a match, regardless of score.
    Binary,
}

impl RelevancePolicy {
    fn gain(&self, hit: &SearchHit) -> f64 {
        match self {
            RelevancePolicy::RawScore => hit.raw_score,
            RelevancePolicy::Binary => 1.0,
        }
    }
}

/// Discounted cumulative gain of a relevance sequence, rank 0 first.
pub fn dcg(relevance: &[f64]) -> f64 {
    relevance
        .iter()
        .enumerate()
        .map(|(i, rel)| rel / ((i + 2) as f64).log2())
        .sum()
}

/// NDCG of an already-truncated relevance sequence.
pub fn ndcg(relevance: &[f64]) -> f64 {
    let dcg_score = dcg(relevance);

    let idcg_score = if relevance.is_empty() {
        1.0
    } else {
        let mut ideal = relevance.to_vec();
        ideal.sort_by(|a, b| b.total_cmp(a));
        dcg(&ideal)
    };

    if idcg_score != 0.0 {
        dcg_score / idcg_score
    } else {
        0.0
    }
}

/// Whether `hit` is the ground-truth document.
pub fn is_match(hit: &SearchHit, ground_truth: &str, key: &GroundTruthKey) -> bool {
    match key {
        GroundTruthKey::DocumentName => hit.document_name == ground_truth,
        GroundTruthKey::Metadata(field) => {
            hit.metadata_str(field).as_deref() == Some(ground_truth)
        }
    }
}

/// Relevance of each of the first `k` hits. Fewer than `k` hits are not padded.
pub fn relevance_at_k(
    hits: &[SearchHit],
    ground_truth: &str,
    key: &GroundTruthKey,
    k: usize,
    policy: RelevancePolicy,
) -> Vec<f64> {
    hits.iter()
        .take(k)
        .map(|hit| {
            if is_match(hit, ground_truth, key) {
                policy.gain(hit)
            } else {
                0.0
            }
        })
        .collect()
}

/// NDCG@k for one query's hits.
pub fn ndcg_at_k(
    hits: &[SearchHit],
    ground_truth: &str,
    key: &GroundTruthKey,
    k: usize,
    policy: RelevancePolicy,
) -> f64 {
    ndcg(&relevance_at_k(hits, ground_truth, key, k, policy))
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
