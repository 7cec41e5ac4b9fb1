//! Benchmark datasets: the document/query records, the catalogue of
//! dataset-to-collection pairs, and JSON loaders for both.
//!
//! On-disk layout under the data directory:
//! - `documents/<dataset>.json`: array of `{id, image, doc_id, image_filename}`
//!   where `image` is the base64-encoded page image
//! - `queries/<dataset>.json`: array of `{query, id, image_filename}`

use crate::error::{BenchError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A page image to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Name the document is upserted under; search hits report it back.
    pub id: String,
    /// Encoded image bytes.
    pub payload: Vec<u8>,
    /// Identifier of the source document the page belongs to.
    pub doc_id: String,
    pub filename: String,
}

/// A labeled query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    /// Identifier of the document that should be retrieved.
    pub ground_truth: String,
}

impl Query {
    pub fn new(text: impl Into<String>, ground_truth: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ground_truth: ground_truth.into(),
        }
    }
}

/// Which field of a search hit identifies the ground-truth document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GroundTruthKey {
    /// The name the document was upserted under (its `id`).
    #[default]
    DocumentName,
    /// A metadata field, e.g. `image_file_name`.
    Metadata(String),
}

/// Metadata field holding the page image filename.
pub const FILENAME_FIELD: &str = "image_file_name";
/// Metadata field holding the source document id.
pub const DOC_ID_FIELD: &str = "doc_id";

/// One benchmark dataset and the collection it is uploaded to.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetEntry {
    /// Dataset file stem, also used as the report column name.
    pub name: String,
    pub collection: String,
    pub ground_truth: GroundTruthKey,
}

impl DatasetEntry {
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            ground_truth: GroundTruthKey::default(),
        }
    }

    pub fn with_ground_truth(mut self, key: GroundTruthKey) -> Self {
        self.ground_truth = key;
        self
    }

    /// Same dataset, uploaded to a different collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }
}

/// Fixed list of datasets the runner knows about.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    pub entries: Vec<DatasetEntry>,
}

const VIDORE_DATASETS: &[&str] = &[
    "arxivqa_test_subsampled",
    "docvqa_test_subsampled",
    "infovqa_test_subsampled",
    "shiftproject_test",
    "syntheticDocQA_artificial_intelligence_test",
    "syntheticDocQA_energy_test",
    "syntheticDocQA_government_reports_test",
    "syntheticDocQA_healthcare_industry_test",
    "tabfquad_test_subsampled",
    "tatdqa_test",
];

impl Catalogue {
    pub fn new(entries: Vec<DatasetEntry>) -> Self {
        Self { entries }
    }

    /// The ViDoRe benchmark suite, one collection per dataset.
    pub fn vidore() -> Self {
        Self::new(
            VIDORE_DATASETS
                .iter()
                .map(|name| DatasetEntry::new(*name, *name))
                .collect(),
        )
    }

    /// Look up an entry by collection name.
    pub fn find(&self, collection: &str) -> Option<&DatasetEntry> {
        self.entries.iter().find(|e| e.collection == collection)
    }

    /// Look up an entry by collection name, or explain what is available.
    pub fn require(&self, collection: &str) -> Result<&DatasetEntry> {
        self.find(collection)
            .ok_or_else(|| BenchError::UnknownCollection {
                name: collection.to_string(),
                known: self.collection_names(),
            })
    }

    /// Look up an entry by dataset name.
    pub fn require_dataset(&self, name: &str) -> Result<&DatasetEntry> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| BenchError::UnknownDataset {
                name: name.to_string(),
                known: self.entries.iter().map(|e| e.name.clone()).collect(),
            })
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.collection.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where the runner gets documents and queries for a dataset.
pub trait DatasetSource {
    /// Documents for `entry`, at most `max_rows` if given.
    fn documents(&self, entry: &DatasetEntry, max_rows: Option<usize>) -> Result<Vec<Document>>;

    /// Queries for `entry`, at most `max_rows` if given.
    fn queries(&self, entry: &DatasetEntry, max_rows: Option<usize>) -> Result<Vec<Query>>;
}

/// Accept both `"12"` and `12` for identifier fields.
fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    match Option::<serde_json::Value>::deserialize(d)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct DocumentRow {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    image: String,
    #[serde(rename = "docId", alias = "doc_id", deserialize_with = "string_or_number")]
    doc_id: String,
    image_filename: String,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(default)]
    query: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    id: Option<String>,
    #[serde(default)]
    image_filename: Option<String>,
}

/// JSON datasets in a local data directory.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn documents_path(&self, entry: &DatasetEntry) -> PathBuf {
        self.root
            .join("documents")
            .join(format!("{}.json", entry.name))
    }

    pub fn queries_path(&self, entry: &DatasetEntry) -> PathBuf {
        self.root.join("queries").join(format!("{}.json", entry.name))
    }

    fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
        let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| BenchError::Dataset(format!("{}: {}", path.display(), e)))
    }
}

impl DatasetSource for DataDir {
    fn documents(&self, entry: &DatasetEntry, max_rows: Option<usize>) -> Result<Vec<Document>> {
        let path = self.documents_path(entry);
        let rows: Vec<DocumentRow> = Self::read_rows(&path)?;

        rows.into_iter()
            .take(max_rows.unwrap_or(usize::MAX))
            .map(|row| {
                let payload = STANDARD.decode(row.image.as_bytes()).map_err(|e| {
                    BenchError::Dataset(format!(
                        "{}: document {} has an invalid image: {}",
                        path.display(),
                        row.id,
                        e
                    ))
                })?;
                Ok(Document {
                    id: row.id,
                    payload,
                    doc_id: row.doc_id,
                    filename: row.image_filename,
                })
            })
            .collect()
    }

    fn queries(&self, entry: &DatasetEntry, max_rows: Option<usize>) -> Result<Vec<Query>> {
        let path = self.queries_path(entry);
        let rows: Vec<QueryRow> = Self::read_rows(&path)?;

        // Rows without query text are dropped before the row limit applies.
        rows.into_iter()
            .filter_map(|row| row.query.clone().map(|text| (text, row)))
            .take(max_rows.unwrap_or(usize::MAX))
            .map(|(text, row)| {
                // Metadata-keyed datasets label queries by image filename.
                let ground_truth = match &entry.ground_truth {
                    GroundTruthKey::DocumentName => row.id,
                    GroundTruthKey::Metadata(_) => row.image_filename,
                };
                let ground_truth = ground_truth.ok_or_else(|| {
                    BenchError::Dataset(format!(
                        "{}: query '{}' has no ground truth",
                        path.display(),
                        text
                    ))
                })?;
                Ok(Query { text, ground_truth })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_vidore_catalogue() {
        let catalogue = Catalogue::vidore();
        assert_eq!(catalogue.len(), 10);
        assert!(catalogue.find("docvqa_test_subsampled").is_some());
        assert!(catalogue.find("docvqa").is_none());
    }

    #[test]
    fn test_require_unknown_collection() {
        let catalogue = Catalogue::new(vec![DatasetEntry::new("a", "coll_a")]);
        match catalogue.require("coll_b") {
            Err(BenchError::UnknownCollection { name, known }) => {
                assert_eq!(name, "coll_b");
                assert_eq!(known, vec!["coll_a".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_require_dataset_by_name() {
        let catalogue = Catalogue::new(vec![DatasetEntry::new("a", "coll_a")]);
        assert_eq!(catalogue.require_dataset("a").unwrap().collection, "coll_a");
        assert!(matches!(
            catalogue.require_dataset("coll_a"),
            Err(BenchError::UnknownDataset { .. })
        ));
    }

    #[test]
    fn test_load_documents() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "documents/docs.json",
            r#"[
                {"id": 0, "image": "aGVsbG8=", "docId": 101, "image_filename": "a.png"},
                {"id": 1, "image": "d29ybGQ=", "docId": 102, "image_filename": "b.png"}
            ]"#,
        );

        let data = DataDir::new(dir.path());
        let entry = DatasetEntry::new("docs", "docs");
        let docs = data.documents(&entry, None).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "0");
        assert_eq!(docs[0].payload, b"hello");
        assert_eq!(docs[0].doc_id, "101");
        assert_eq!(docs[1].filename, "b.png");

        assert_eq!(data.documents(&entry, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_load_documents_rejects_bad_image() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "documents/docs.json",
            r#"[{"id": "0", "image": "not base64!", "docId": "1", "image_filename": "a.png"}]"#,
        );

        let data = DataDir::new(dir.path());
        let result = data.documents(&DatasetEntry::new("docs", "docs"), None);
        assert!(matches!(result, Err(BenchError::Dataset(_))));
    }

    #[test]
    fn test_load_queries_drops_missing_text() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "queries/q.json",
            r#"[
                {"query": "what is shown?", "id": 3, "image_filename": "c.png"},
                {"query": null, "id": 4},
                {"query": "second", "id": "5", "image_filename": "e.png"}
            ]"#,
        );

        let data = DataDir::new(dir.path());
        let by_id = DatasetEntry::new("q", "q");
        let queries = data.queries(&by_id, None).unwrap();
        assert_eq!(
            queries,
            vec![Query::new("what is shown?", "3"), Query::new("second", "5")]
        );

        let by_filename = DatasetEntry::new("q", "q")
            .with_ground_truth(GroundTruthKey::Metadata(FILENAME_FIELD.to_string()));
        let queries = data.queries(&by_filename, Some(1)).unwrap();
        assert_eq!(queries, vec![Query::new("what is shown?", "c.png")]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let data = DataDir::new(dir.path());
        let result = data.queries(&DatasetEntry::new("absent", "absent"), None);
        assert!(matches!(result, Err(BenchError::Io { .. })));
    }
}
