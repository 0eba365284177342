use crate::models::{Document, Metadata, PAGE_CONTENT_KEY, SOURCE_KEY, TOTAL_PAGES_KEY};
use crate::IngestError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Enrichment fields for one source PDF, keyed by its bare file name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetadataRecord {
    pub filename: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SidecarFile {
    #[serde(default)]
    documents: Vec<MetadataRecord>,
}

/// Read the sidecar metadata file. A missing or malformed file means "no enrichment".
pub async fn read_metadata(path: &Path) -> Vec<MetadataRecord> {
    match try_read_metadata(path).await {
        Ok(records) => records,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                %error,
                "error reading metadata, continuing without it"
            );
            Vec::new()
        }
    }
}

async fn try_read_metadata(path: &Path) -> Result<Vec<MetadataRecord>, IngestError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let parsed: SidecarFile = serde_json::from_str(&raw)?;
    Ok(parsed.documents)
}

/// Merge sidecar records into documents whose source file name matches exactly.
pub fn apply_sidecar(documents: &mut [Document], records: &[MetadataRecord]) {
    if records.is_empty() {
        return;
    }

    for document in documents.iter_mut() {
        let Some(file_name) = document
            .metadata
            .get_str(SOURCE_KEY)
            .and_then(|source| Path::new(source).file_name())
            .and_then(|name| name.to_str())
            .map(str::to_string)
        else {
            continue;
        };

        if let Some(record) = records.iter().find(|record| record.filename == file_name) {
            document.metadata.insert("filename", record.filename.clone());
            document.metadata.merge(&record.fields);
            document
                .metadata
                .insert(PAGE_CONTENT_KEY, document.page_content.clone());
        }
    }
}

/// Collapse loader-specific nesting into a flat mapping the index can store.
///
/// `pdf.pageCount` (or `pdf.totalPages`) becomes `totalPages`; `pdf` and `loc` are removed.
pub fn flatten_metadata(metadata: Metadata) -> Metadata {
    let mut flat = metadata;

    if let Some(pdf) = flat.remove("pdf") {
        let page_count = pdf
            .get("pageCount")
            .or_else(|| pdf.get("totalPages"))
            .filter(|value| !value.is_null())
            .cloned();
        if let Some(page_count) = page_count {
            flat.insert(TOTAL_PAGES_KEY, page_count);
        }
    }

    flat.remove("loc");
    flat
}
