use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::models::{Document, Metadata, SOURCE_KEY};
use crate::IngestError;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Load one [`Document`] per PDF page under `folder`, recursively.
///
/// Files that cannot be parsed are reported in `skipped_files` instead of failing the load.
pub fn load_documents(folder: &Path) -> Result<LoadReport, IngestError> {
    load_documents_with(folder, &LopdfExtractor)
}

pub fn load_documents_with<X: PdfExtractor>(
    folder: &Path,
    extractor: &X,
) -> Result<LoadReport, IngestError> {
    if !folder.is_dir() {
        return Err(IngestError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("document directory not found: {}", folder.display()),
        )));
    }

    let mut documents = Vec::new();
    let mut skipped_files = Vec::new();

    for path in discover_pdf_files(folder) {
        match load_pdf(&path, extractor) {
            Ok(pages) => documents.extend(pages),
            Err(error) => skipped_files.push(SkippedPdf {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(LoadReport {
        documents,
        skipped_files,
    })
}

fn load_pdf<X: PdfExtractor>(path: &Path, extractor: &X) -> Result<Vec<Document>, IngestError> {
    if path.file_name().is_none() {
        return Err(IngestError::MissingFileName(path.display().to_string()));
    }

    let checksum = digest_file(path)?;
    let extracted = extractor.extract_pages(path)?;
    let source = path.to_string_lossy().to_string();

    Ok(extracted
        .pages
        .into_iter()
        .map(|page| {
            let mut metadata = Metadata::new();
            metadata.insert(SOURCE_KEY, source.clone());
            metadata.insert("checksum", checksum.clone());
            metadata.insert(
                "pdf",
                json!({
                    "version": extracted.version,
                    "pageCount": extracted.page_count,
                }),
            );
            metadata.insert("loc", json!({ "pageNumber": page.number }));
            Document::new(page.text, metadata)
        })
        .collect())
}
