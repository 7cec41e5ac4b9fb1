//! Document ingestion: bring a remote collection in line with a local dataset.

use crate::backend::{DocumentRecord, Metadata, RetrievalBackend};
use crate::dataset::{DOC_ID_FIELD, Document, FILENAME_FIELD};
use crate::error::{BenchError, Result};
use crate::retry::{RetryPolicy, retry};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

/// Uploads documents into a collection with per-document retry.
#[derive(Debug, Clone)]
pub struct DocumentIngestor {
    policy: RetryPolicy,
    synchronous: bool,
}

impl DocumentIngestor {
    /// `synchronous` makes every upsert wait for the backend to finish
    /// processing the document before the next one is sent.
    pub fn new(policy: RetryPolicy, synchronous: bool) -> Self {
        Self {
            policy,
            synchronous,
        }
    }

    /// Create `name` unless the backend already lists it.
    ///
    /// Returns whether a create call was issued. Check and create are two
    /// separate calls; a concurrent creator can slip in between.
    pub async fn ensure_collection<B: RetrievalBackend>(
        &self,
        backend: &B,
        name: &str,
    ) -> Result<bool> {
        let collections = backend.list_collections().await?;
        if collections.iter().any(|c| c.name == name) {
            debug!(collection = name, "collection already exists");
            return Ok(false);
        }

        info!(collection = name, "creating collection");
        backend.create_collection(name).await?;
        Ok(true)
    }

    /// Upsert a single document, retrying per the ingestor's policy.
    pub async fn upsert_one<B: RetrievalBackend>(
        &self,
        backend: &B,
        document: &Document,
        collection: &str,
        synchronous: bool,
    ) -> Result<bool> {
        let encoded = STANDARD.encode(&document.payload);
        let metadata = document_metadata(document);
        let operation = format!("upsert of document '{}'", document.id);
        let (encoded, metadata) = (&encoded, &metadata);

        retry(&self.policy, &operation, || async move {
            let acknowledged = backend
                .upsert_document(&document.id, encoded, metadata, collection, synchronous)
                .await?;
            if acknowledged {
                Ok(true)
            } else {
                Err(BenchError::NotAcknowledged(document.id.clone()))
            }
        })
        .await
    }

    /// Upload `documents[start_index..]` into `collection`.
    ///
    /// Returns the backend's listing of the collection afterwards. If an
    /// upsert runs out of retries the whole batch stops with
    /// [`BenchError::IngestionAborted`], carrying the offset to pass back as
    /// `start_index` once the backend recovers.
    pub async fn upsert_batch<B: RetrievalBackend>(
        &self,
        backend: &B,
        documents: &[Document],
        collection: &str,
        start_index: usize,
    ) -> Result<Vec<DocumentRecord>> {
        self.ensure_collection(backend, collection).await?;

        let pending = documents.get(start_index..).unwrap_or_default();
        info!(
            collection,
            start_index,
            count = pending.len(),
            synchronous = self.synchronous,
            "upserting documents"
        );

        for (offset, document) in pending.iter().enumerate() {
            let offset = start_index + offset;
            self.upsert_one(backend, document, collection, self.synchronous)
                .await
                .map_err(|source| BenchError::IngestionAborted {
                    collection: collection.to_string(),
                    offset,
                    source: Box::new(source),
                })?;
            debug!(collection, offset, id = %document.id, "document upserted");
        }

        backend.list_documents(collection).await
    }
}

fn document_metadata(document: &Document) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(DOC_ID_FIELD.to_string(), document.doc_id.clone().into());
    metadata.insert(FILENAME_FIELD.to_string(), document.filename.clone().into());
    metadata
}
