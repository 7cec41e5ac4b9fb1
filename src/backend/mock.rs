//! Scripted in-memory backend for tests.

use super::{
    CollectionInfo, DocumentRecord, Metadata, RetrievalBackend, SearchHit, SearchResponse,
};
use crate::error::{BenchError, Result};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    collections: BTreeMap<String, BTreeMap<String, Metadata>>,
    create_calls: Vec<String>,
    upsert_calls: Vec<(String, bool)>,
    search_calls: usize,
    list_collection_calls: usize,
    /// Remaining failures per document name; `usize::MAX` fails forever.
    upsert_failures: HashMap<String, usize>,
    /// Responses returned in order before falling back to `default_hits`.
    scripted_search: VecDeque<Result<SearchResponse>>,
    default_hits: Vec<SearchHit>,
    fail_list_collections: bool,
}

pub(crate) struct MockBackend {
    state: Mutex<State>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_collection(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .collections
            .entry(name.to_string())
            .or_default();
        self
    }

    /// Every search without a scripted response returns these hits.
    pub fn with_hits(self, hits: Vec<SearchHit>) -> Self {
        self.state.lock().unwrap().default_hits = hits;
        self
    }

    pub fn script_search(&self, response: Result<SearchResponse>) {
        self.state.lock().unwrap().scripted_search.push_back(response);
    }

    pub fn fail_upserts(&self, name: &str, times: usize) {
        self.state
            .lock()
            .unwrap()
            .upsert_failures
            .insert(name.to_string(), times);
    }

    pub fn fail_list_collections(&self) {
        self.state.lock().unwrap().fail_list_collections = true;
    }

    pub fn create_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().create_calls.clone()
    }

    pub fn upsert_calls(&self) -> Vec<(String, bool)> {
        self.state.lock().unwrap().upsert_calls.clone()
    }

    pub fn search_calls(&self) -> usize {
        self.state.lock().unwrap().search_calls
    }

    pub fn list_collection_calls(&self) -> usize {
        self.state.lock().unwrap().list_collection_calls
    }
}

impl RetrievalBackend for MockBackend {
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let mut state = self.state.lock().unwrap();
        state.list_collection_calls += 1;
        if state.fail_list_collections {
            return Err(BenchError::Backend {
                status: 401,
                message: "Invalid token.".to_string(),
            });
        }
        Ok(state
            .collections
            .keys()
            .map(|name| CollectionInfo { name: name.clone() })
            .collect())
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.create_calls.push(name.to_string());
        state.collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn upsert_document(
        &self,
        name: &str,
        _document_base64: &str,
        metadata: &Metadata,
        collection_name: &str,
        wait: bool,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.upsert_calls.push((name.to_string(), wait));

        if let Some(remaining) = state.upsert_failures.get_mut(name) {
            if *remaining > 0 {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                return Err(BenchError::Http("connection reset".to_string()));
            }
        }

        let collection = state
            .collections
            .get_mut(collection_name)
            .ok_or_else(|| BenchError::Backend {
                status: 404,
                message: format!("collection {} not found", collection_name),
            })?;
        collection.insert(name.to_string(), metadata.clone());
        Ok(true)
    }

    async fn list_documents(&self, collection_name: &str) -> Result<Vec<DocumentRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .collections
            .get(collection_name)
            .map(|docs| {
                docs.iter()
                    .map(|(name, metadata)| DocumentRecord {
                        name: name.clone(),
                        metadata: metadata.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn search(
        &self,
        _query: &str,
        _collection_name: &str,
        top_k: usize,
    ) -> Result<SearchResponse> {
        let mut state = self.state.lock().unwrap();
        state.search_calls += 1;
        if let Some(scripted) = state.scripted_search.pop_front() {
            return scripted;
        }
        Ok(SearchResponse {
            results: state.default_hits.iter().take(top_k).cloned().collect(),
        })
    }
}
