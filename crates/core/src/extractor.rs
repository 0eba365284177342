use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Text of every page in one PDF, in page order.
#[derive(Debug, Clone)]
pub struct PdfPages {
    pub version: String,
    pub page_count: usize,
    pub pages: Vec<PageText>,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<PdfPages, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<PdfPages, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let page_numbers = document.get_pages().into_keys().collect::<Vec<_>>();
        if page_numbers.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf has no pages: {}",
                path.display()
            )));
        }

        let mut pages = Vec::with_capacity(page_numbers.len());
        for page_no in &page_numbers {
            // Pages without a text layer still count towards the total.
            let text = match document.extract_text(&[*page_no]) {
                Ok(text) => text,
                Err(error) => {
                    tracing::debug!(
                        path = %path.display(),
                        page = page_no,
                        %error,
                        "page text unavailable"
                    );
                    String::new()
                }
            };

            pages.push(PageText {
                number: *page_no,
                text,
            });
        }

        Ok(PdfPages {
            version: document.version.clone(),
            page_count: page_numbers.len(),
            pages,
        })
    }
}

pub fn extract_page_texts(path: &Path) -> Result<PdfPages, IngestError> {
    LopdfExtractor.extract_pages(path)
}
