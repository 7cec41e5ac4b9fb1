//! REST client for the retrieval service.
//!
//! Talks to a ColiVara-style API: collections, documents and search under
//! `/v1`, authenticated with a bearer token.

use super::{
    CollectionInfo, DocumentRecord, Metadata, RetrievalBackend, SearchHit, SearchResponse,
};
use crate::config::BackendConfig;
use crate::error::{BenchError, Result};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Request body for collection creation.
#[derive(Debug, Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
}

/// Request body for document upsert.
#[derive(Debug, Serialize)]
struct UpsertDocumentRequest<'a> {
    name: &'a str,
    document_base64: &'a str,
    metadata: &'a Metadata,
    collection_name: &'a str,
    wait: bool,
}

/// Request body for search.
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    collection_name: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    detail: String,
}

/// HTTP implementation of [`RetrievalBackend`].
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Create a new client with the given configuration.
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Build the full URL for an API path.
    fn endpoint(&self, path: &str) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/v1/{}", base, path.trim_start_matches('/'))
    }

    /// URL of a collection's document listing, with the name percent-encoded
    /// as a single path segment.
    fn documents_url(&self, collection_name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint("collections/"))
            .map_err(|e| BenchError::Config(format!("Invalid API base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| BenchError::Config("API base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .push(collection_name)
            .push("documents")
            .push("");
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
    }

    /// Send a request and return the raw body, mapping non-2xx to an error.
    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = self.authorized(request).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiError>(&body) {
                Ok(api_error) => api_error.detail,
                Err(_) => body,
            };
            return Err(BenchError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl RetrievalBackend for HttpBackend {
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        self.send_json(self.client.get(self.endpoint("collections/"))).await
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        let request = self
            .client
            .post(self.endpoint("collections/"))
            .json(&CreateCollectionRequest { name });
        self.send(request).await?;
        Ok(())
    }

    async fn upsert_document(
        &self,
        name: &str,
        document_base64: &str,
        metadata: &Metadata,
        collection_name: &str,
        wait: bool,
    ) -> Result<bool> {
        let request = self
            .client
            .post(self.endpoint("documents/upsert-document/"))
            .json(&UpsertDocumentRequest {
                name,
                document_base64,
                metadata,
                collection_name,
                wait,
            });
        self.send(request).await?;
        Ok(true)
    }

    async fn list_documents(&self, collection_name: &str) -> Result<Vec<DocumentRecord>> {
        let url = self.documents_url(collection_name)?;
        self.send_json(self.client.get(url)).await
    }

    async fn search(
        &self,
        query: &str,
        collection_name: &str,
        top_k: usize,
    ) -> Result<SearchResponse> {
        let request = self
            .client
            .post(self.endpoint("search/"))
            .json(&SearchRequest {
                query,
                collection_name,
                top_k,
            });
        let body: SearchResponseBody = self.send_json(request).await?;
        Ok(SearchResponse {
            results: body.results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(api_base: &str) -> HttpBackend {
        HttpBackend::new(BackendConfig {
            api_base: api_base.to_string(),
            api_key: "test".to_string(),
        })
    }

    #[test]
    fn test_endpoint_construction() {
        let client = backend("https://api.example.com/");
        assert_eq!(
            client.endpoint("collections/"),
            "https://api.example.com/v1/collections/"
        );

        // Without trailing slash
        let client2 = backend("https://api.example.com");
        assert_eq!(
            client2.endpoint("/search/"),
            "https://api.example.com/v1/search/"
        );
    }

    #[test]
    fn test_documents_url_encodes_collection_name() {
        let client = backend("https://api.example.com/");
        assert_eq!(
            client.documents_url("docvqa").unwrap().as_str(),
            "https://api.example.com/v1/collections/docvqa/documents/"
        );
        assert_eq!(
            client.documents_url("my docs/2").unwrap().as_str(),
            "https://api.example.com/v1/collections/my%20docs%2F2/documents/"
        );
    }

    #[test]
    fn test_documents_url_rejects_invalid_base() {
        let client = backend("not a url");
        assert!(matches!(
            client.documents_url("docvqa"),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn test_search_body_requires_raw_score() {
        let body = r#"{"results": [{"document_name": "1", "metadata": {}}]}"#;
        let err: BenchError = serde_json::from_str::<SearchResponseBody>(body)
            .unwrap_err()
            .into();
        assert!(matches!(err, BenchError::Serialization(_)));
    }

    #[test]
    fn test_upsert_request_shape() {
        let mut metadata = Metadata::new();
        metadata.insert("doc_id".to_string(), "101".into());
        let body = serde_json::to_value(UpsertDocumentRequest {
            name: "1",
            document_base64: "aGk=",
            metadata: &metadata,
            collection_name: "docvqa",
            wait: true,
        })
        .unwrap();

        assert_eq!(body["name"], "1");
        assert_eq!(body["collection_name"], "docvqa");
        assert_eq!(body["wait"], true);
        assert_eq!(body["metadata"]["doc_id"], "101");
    }

    #[test]
    fn test_api_error_parsing() {
        let err: ApiError = serde_json::from_str(r#"{"detail": "Invalid token."}"#).unwrap();
        assert_eq!(err.detail, "Invalid token.");
    }
}
