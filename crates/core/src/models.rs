use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Record identifier, shared by the vector id and its metadata copy.
pub const ID_KEY: &str = "id";
/// Chunk text duplicated into metadata so stored records are self-describing.
pub const PAGE_CONTENT_KEY: &str = "pageContent";
/// Flat page count lifted out of loader-specific metadata.
pub const TOTAL_PAGES_KEY: &str = "totalPages";
/// Path of the PDF a document was loaded from.
pub const SOURCE_KEY: &str = "source";

pub const DEFAULT_INDEX_DIMENSION: usize = 1024;

/// Key-value metadata attached to documents, chunks, and stored vectors.
///
/// Keys [`ID_KEY`], [`PAGE_CONTENT_KEY`] and [`TOTAL_PAGES_KEY`] are reserved and always
/// written by the ingestion pipeline last, so sidecar fields can never shadow them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn merge(&mut self, fields: &Map<String, Value>) {
        for (key, value) in fields {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Values the vector index accepts: strings, numbers, booleans and lists of strings.
    pub fn storable(&self) -> Map<String, Value> {
        self.0
            .iter()
            .filter(|(key, value)| {
                let keep = match value {
                    Value::String(_) | Value::Number(_) | Value::Bool(_) => true,
                    Value::Array(items) => items.iter().all(Value::is_string),
                    Value::Null | Value::Object(_) => false,
                };
                if !keep {
                    tracing::debug!(key = %key, "dropping metadata value the index cannot store");
                }
                keep
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub page_content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(page_content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: Uuid,
    pub values: Vec<f32>,
    pub metadata: Metadata,
}

/// A stored vector returned by a similarity query, best match first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f32,
    pub values: Vec<f32>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub page_content: String,
    pub metadata: Metadata,
}

impl SearchHit {
    /// Identifier used for deduplication: the stored `id` metadata, else the vector id.
    pub fn stable_id(&self) -> &str {
        self.metadata.get_str(ID_KEY).unwrap_or(self.id.as_str())
    }
}

impl From<ScoredRecord> for SearchHit {
    fn from(record: ScoredRecord) -> Self {
        let page_content = record
            .metadata
            .get_str(PAGE_CONTENT_KEY)
            .unwrap_or_default()
            .to_string();

        Self {
            id: record.id,
            score: record.score,
            page_content,
            metadata: record.metadata,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub docs_dir: PathBuf,
    pub metadata_path: PathBuf,
    pub dimension: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub upsert_batch_size: usize,
    pub batch_pause: Duration,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            metadata_path: PathBuf::from("docs/db.json"),
            dimension: DEFAULT_INDEX_DIMENSION,
            chunk_size: 1_000,
            chunk_overlap: 200,
            batch_size: 5,
            upsert_batch_size: 2,
            batch_pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub k: usize,
    pub fetch_k: usize,
    pub lambda: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: 20,
            fetch_k: 20,
            lambda: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BootstrapOutcome {
    AlreadyPopulated,
    NoDocuments,
    Completed {
        documents: usize,
        chunks: usize,
        batches: usize,
        skipped_batches: usize,
        vectors_upserted: usize,
    },
}

impl BootstrapOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::AlreadyPopulated => {
                "Index already has vectors. Skipping bootstrapping.".to_string()
            }
            Self::NoDocuments => "No documents found in the specified directory.".to_string(),
            Self::Completed {
                vectors_upserted,
                chunks,
                ..
            } => format!("Ingestion complete: {vectors_upserted} of {chunks} chunks indexed."),
        }
    }
}
