//! Retrieval backend integration.
//!
//! [`RetrievalBackend`] is the full set of capabilities the benchmark needs
//! from the remote service. [`HttpBackend`] implements it over REST.

mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::HttpBackend;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Document metadata as stored on the backend.
pub type Metadata = HashMap<String, serde_json::Value>;

/// A collection as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
}

/// A document as reported by the backend listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// One ranked hit returned for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Name the document was upserted under.
    pub document_name: String,
    /// Backend confidence for this hit.
    pub raw_score: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SearchHit {
    pub fn new(document_name: impl Into<String>, raw_score: f64) -> Self {
        Self {
            document_name: document_name.into(),
            raw_score,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Metadata field rendered as a plain string (numbers are stringified).
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Ordered search results, rank 0 first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

/// Capabilities required from a document-retrieval service.
///
/// Retried calls (`upsert_document`, `search`) must be idempotent on the
/// backend side for the same document name.
#[allow(async_fn_in_trait)]
pub trait RetrievalBackend {
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    async fn create_collection(&self, name: &str) -> Result<()>;

    /// Upsert one document. `wait` asks the backend to finish processing
    /// before answering. Returns the backend's acknowledgement.
    async fn upsert_document(
        &self,
        name: &str,
        document_base64: &str,
        metadata: &Metadata,
        collection_name: &str,
        wait: bool,
    ) -> Result<bool>;

    async fn list_documents(&self, collection_name: &str) -> Result<Vec<DocumentRecord>>;

    async fn search(&self, query: &str, collection_name: &str, top_k: usize)
    -> Result<SearchResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_str() {
        let hit = SearchHit::new("7", 0.5)
            .with_metadata("image_file_name", "page_7.png")
            .with_metadata("doc_id", 101)
            .with_metadata("empty", serde_json::Value::Null);

        assert_eq!(hit.metadata_str("image_file_name").as_deref(), Some("page_7.png"));
        assert_eq!(hit.metadata_str("doc_id").as_deref(), Some("101"));
        assert_eq!(hit.metadata_str("empty"), None);
        assert_eq!(hit.metadata_str("missing"), None);
    }

    #[test]
    fn test_search_hit_metadata_defaults_to_empty() {
        let json = r#"{"results": [{"document_name": "3", "raw_score": 0.8}]}"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].raw_score, 0.8);
        assert!(response.results[0].metadata.is_empty());
    }

    #[test]
    fn test_search_hit_without_raw_score_is_rejected() {
        let json = r#"{"results": [{"document_name": "1"}, {"document_name": "2"}]}"#;
        let err = serde_json::from_str::<SearchResponse>(json).unwrap_err();
        assert!(err.to_string().contains("raw_score"));
    }
}
