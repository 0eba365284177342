use crate::chunking::{ChunkingConfig, RecursiveCharacterSplitter};
use crate::embeddings::Embedder;
use crate::loader::load_documents;
use crate::metadata::{apply_sidecar, flatten_metadata, read_metadata};
use crate::models::{
    BootstrapOptions, BootstrapOutcome, Document, Metadata, VectorRecord, ID_KEY,
    PAGE_CONTENT_KEY,
};
use crate::traits::VectorIndex;
use crate::validate::is_valid_content;
use crate::IngestError;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq)]
enum BatchResult {
    Upserted(usize),
    Empty,
    CountMismatch { expected: usize, received: usize },
    DimensionMismatch { expected: usize, received: usize },
}

/// Populates an index from the PDFs on disk, at most once.
///
/// A run against an index that already reports vectors is a no-op. Otherwise chunks are
/// embedded and upserted in small sequential batches; a failing batch is logged and skipped
/// so the rest of the corpus still lands.
pub struct Bootstrapper<E, V>
where
    E: Embedder,
    V: VectorIndex,
{
    embedder: Arc<E>,
    index: Arc<V>,
    options: BootstrapOptions,
    splitter: RecursiveCharacterSplitter,
}

impl<E, V> Bootstrapper<E, V>
where
    E: Embedder,
    V: VectorIndex,
{
    pub fn new(
        embedder: Arc<E>,
        index: Arc<V>,
        options: BootstrapOptions,
    ) -> Result<Self, IngestError> {
        let splitter = RecursiveCharacterSplitter::new(ChunkingConfig::from(&options))?;
        Ok(Self {
            embedder,
            index,
            options,
            splitter,
        })
    }

    pub fn options(&self) -> &BootstrapOptions {
        &self.options
    }

    pub async fn run(&self, index_name: &str) -> Result<BootstrapOutcome, IngestError> {
        tracing::info!(index = index_name, "running bootstrapping procedure");

        self.index
            .create_index_if_absent(index_name, self.options.dimension)
            .await?;

        if self.index.has_vectors(index_name).await {
            tracing::info!(index = index_name, "index already has vectors, skipping bootstrapping");
            return Ok(BootstrapOutcome::AlreadyPopulated);
        }

        tracing::info!(dir = %self.options.docs_dir.display(), "loading documents and metadata");
        let docs_dir = self.options.docs_dir.clone();
        let load_result = tokio::task::spawn_blocking(move || load_documents(&docs_dir))
            .await
            .map_err(|error| IngestError::Task(error.to_string()))?;
        let report = match load_result {
            Ok(report) => report,
            Err(IngestError::Io(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(%error, "document directory is missing");
                return Ok(BootstrapOutcome::NoDocuments);
            }
            Err(error) => return Err(error),
        };

        for skipped in &report.skipped_files {
            tracing::warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
        }

        if report.documents.is_empty() {
            tracing::info!("no documents found in the specified directory");
            return Ok(BootstrapOutcome::NoDocuments);
        }

        let records = read_metadata(&self.options.metadata_path).await;
        let loaded = report.documents.len();
        let mut documents = report
            .documents
            .into_iter()
            .filter(|document| is_valid_content(&document.page_content))
            .collect::<Vec<_>>();
        apply_sidecar(&mut documents, &records);
        tracing::info!(valid = documents.len(), loaded, "loaded valid documents");

        let chunks = self.splitter.split_documents(&documents);
        tracing::info!(chunks = chunks.len(), "split documents into chunks");

        let batch_size = self.options.batch_size.max(1);
        let total_batches = chunks.len().div_ceil(batch_size);
        let mut vectors_upserted = 0;
        let mut skipped_batches = 0;

        for (position, batch) in chunks.chunks(batch_size).enumerate() {
            let number = position + 1;
            tracing::info!(batch = number, total = total_batches, "ingesting batch");

            match self.ingest_batch(index_name, batch).await {
                Ok(BatchResult::Upserted(count)) => vectors_upserted += count,
                Ok(BatchResult::Empty) => {
                    tracing::info!(batch = number, "skipping batch, no valid content found");
                    skipped_batches += 1;
                    continue;
                }
                Ok(BatchResult::CountMismatch { expected, received }) => {
                    tracing::error!(
                        batch = number,
                        expected,
                        received,
                        "mismatch in number of embeddings generated, skipping batch"
                    );
                    skipped_batches += 1;
                }
                Ok(BatchResult::DimensionMismatch { expected, received }) => {
                    tracing::error!(
                        batch = number,
                        expected,
                        received,
                        "embedding dimension does not match index, skipping batch"
                    );
                    skipped_batches += 1;
                }
                Err(error) => {
                    tracing::error!(
                        batch = number,
                        batch_size = batch.len(),
                        %error,
                        "error processing batch"
                    );
                    skipped_batches += 1;
                }
            }

            if number < total_batches && !self.options.batch_pause.is_zero() {
                tokio::time::sleep(self.options.batch_pause).await;
            }
        }

        let outcome = BootstrapOutcome::Completed {
            documents: documents.len(),
            chunks: chunks.len(),
            batches: total_batches,
            skipped_batches,
            vectors_upserted,
        };
        tracing::info!(index = index_name, ?outcome, "bootstrapping finished");
        Ok(outcome)
    }

    async fn ingest_batch(
        &self,
        index_name: &str,
        batch: &[Document],
    ) -> Result<BatchResult, IngestError> {
        let prepared = batch
            .iter()
            .filter(|chunk| is_valid_content(&chunk.page_content))
            .map(prepare_chunk)
            .collect::<Vec<_>>();

        if prepared.is_empty() {
            return Ok(BatchResult::Empty);
        }

        let texts = prepared
            .iter()
            .map(|(_, text, _)| text.clone())
            .collect::<Vec<_>>();
        tracing::debug!(chunks = texts.len(), "generating embeddings");
        let embeddings = self.embedder.embed_documents(&texts).await?;

        if embeddings.len() != texts.len() {
            return Ok(BatchResult::CountMismatch {
                expected: texts.len(),
                received: embeddings.len(),
            });
        }
        if let Some(wrong) = embeddings
            .iter()
            .find(|values| values.len() != self.options.dimension)
        {
            return Ok(BatchResult::DimensionMismatch {
                expected: self.options.dimension,
                received: wrong.len(),
            });
        }

        let records = prepared
            .into_iter()
            .zip(embeddings)
            .map(|((id, _, metadata), values)| VectorRecord {
                id,
                values,
                metadata,
            })
            .collect::<Vec<_>>();

        self.index
            .upsert_batched(index_name, &records, self.options.upsert_batch_size)
            .await?;
        Ok(BatchResult::Upserted(records.len()))
    }
}

fn prepare_chunk(chunk: &Document) -> (Uuid, String, Metadata) {
    let id = Uuid::new_v4();
    let text = chunk.page_content.trim().to_string();
    let mut metadata = flatten_metadata(chunk.metadata.clone());
    metadata.insert(ID_KEY, id.to_string());
    metadata.insert(PAGE_CONTENT_KEY, text.clone());
    (id, text, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::{EmbeddingError, SearchError};
    use crate::extractor::fixtures::write_text_pdf;
    use crate::models::{ScoredRecord, TOTAL_PAGES_KEY};
    use crate::stores::{PineconeConfig, PineconeStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    const DIM: usize = 8;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[derive(Default)]
    struct RecordingIndex {
        prepopulated: bool,
        upserts: Mutex<Vec<Vec<VectorRecord>>>,
        fail_upsert_call: Option<usize>,
        upsert_calls: AtomicUsize,
    }

    impl RecordingIndex {
        fn upsert_batches(&self) -> Vec<Vec<VectorRecord>> {
            self.upserts
                .lock()
                .map(|batches| batches.clone())
                .unwrap_or_default()
        }

        fn stored(&self) -> Vec<VectorRecord> {
            self.upsert_batches().into_iter().flatten().collect()
        }
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn create_index_if_absent(
            &self,
            _index_name: &str,
            _dimension: usize,
        ) -> Result<(), SearchError> {
            Ok(())
        }

        async fn has_vectors(&self, _index_name: &str) -> bool {
            self.prepopulated || !self.stored().is_empty()
        }

        async fn upsert(
            &self,
            _index_name: &str,
            records: &[VectorRecord],
        ) -> Result<(), SearchError> {
            let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_upsert_call == Some(call) {
                return Err(SearchError::Request("upsert rejected".to_string()));
            }
            if let Ok(mut batches) = self.upserts.lock() {
                batches.push(records.to_vec());
            }
            Ok(())
        }

        async fn query(
            &self,
            _index_name: &str,
            _vector: &[f32],
            _top_k: usize,
        ) -> Result<Vec<ScoredRecord>, SearchError> {
            Ok(Vec::new())
        }
    }

    /// Returns one vector too few on the configured call.
    struct ShortEmbedder {
        calls: AtomicUsize,
        short_on_call: usize,
    }

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn dimensions(&self) -> usize {
            DIM
        }

        async fn embed_documents(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let count = if call == self.short_on_call {
                texts.len() - 1
            } else {
                texts.len()
            };
            Ok(vec![vec![0.5; DIM]; count])
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.5; DIM])
        }
    }

    fn options(docs_dir: &Path, dimension: usize) -> BootstrapOptions {
        BootstrapOptions {
            docs_dir: docs_dir.to_path_buf(),
            metadata_path: docs_dir.join("db.json"),
            dimension,
            batch_pause: Duration::ZERO,
            ..BootstrapOptions::default()
        }
    }

    fn write_pages(path: &Path, pages: usize, lines_per_page: usize) -> TestResult {
        let pages = (1..=pages)
            .map(|page| {
                (1..=lines_per_page)
                    .map(|line| {
                        format!("Page {page} line {line} the tenant shall remedy any breach. ")
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        write_text_pdf(path, &pages)
    }

    #[tokio::test]
    async fn populated_index_is_left_alone() -> TestResult {
        let dir = tempdir()?;
        write_pages(&dir.path().join("a.pdf"), 1, 5)?;
        let index = Arc::new(RecordingIndex {
            prepopulated: true,
            ..Default::default()
        });
        let bootstrapper = Bootstrapper::new(
            Arc::new(CharacterNgramEmbedder { dimensions: DIM }),
            index.clone(),
            options(dir.path(), DIM),
        )?;

        let outcome = bootstrapper.run("legal").await?;

        assert_eq!(outcome, BootstrapOutcome::AlreadyPopulated);
        assert!(index.upsert_batches().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn second_run_performs_no_upserts() -> TestResult {
        let dir = tempdir()?;
        write_pages(&dir.path().join("a.pdf"), 2, 10)?;
        let index = Arc::new(RecordingIndex::default());
        let bootstrapper = Bootstrapper::new(
            Arc::new(CharacterNgramEmbedder { dimensions: DIM }),
            index.clone(),
            options(dir.path(), DIM),
        )?;

        let first = bootstrapper.run("legal").await?;
        let calls_after_first = index.upsert_calls.load(Ordering::SeqCst);
        let second = bootstrapper.run("legal").await?;

        assert!(matches!(
            first,
            BootstrapOutcome::Completed { vectors_upserted, .. } if vectors_upserted > 0
        ));
        assert_eq!(second, BootstrapOutcome::AlreadyPopulated);
        assert_eq!(index.upsert_calls.load(Ordering::SeqCst), calls_after_first);
        Ok(())
    }

    #[tokio::test]
    async fn empty_directory_reports_no_documents() -> TestResult {
        let dir = tempdir()?;
        let index = Arc::new(RecordingIndex::default());
        let bootstrapper = Bootstrapper::new(
            Arc::new(CharacterNgramEmbedder { dimensions: DIM }),
            index.clone(),
            options(dir.path(), DIM),
        )?;

        assert_eq!(bootstrapper.run("legal").await?, BootstrapOutcome::NoDocuments);
        assert_eq!(index.upsert_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_directory_reports_no_documents() -> TestResult {
        let dir = tempdir()?;
        let index = Arc::new(RecordingIndex::default());
        let bootstrapper = Bootstrapper::new(
            Arc::new(CharacterNgramEmbedder { dimensions: DIM }),
            index.clone(),
            options(&dir.path().join("absent"), DIM),
        )?;

        assert_eq!(bootstrapper.run("legal").await?, BootstrapOutcome::NoDocuments);
        assert_eq!(index.upsert_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_batches_but_not_after_the_last() -> TestResult {
        let dir = tempdir()?;
        write_pages(&dir.path().join("a.pdf"), 6, 40)?;
        let index = Arc::new(RecordingIndex::default());
        let pause = Duration::from_secs(1);
        let bootstrapper = Bootstrapper::new(
            Arc::new(CharacterNgramEmbedder { dimensions: DIM }),
            index,
            BootstrapOptions {
                batch_pause: pause,
                ..options(dir.path(), DIM)
            },
        )?;

        let started = tokio::time::Instant::now();
        let outcome = bootstrapper.run("legal").await?;
        let elapsed = started.elapsed();

        let BootstrapOutcome::Completed { batches, .. } = outcome else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert!(batches >= 3);
        let expected = pause * u32::try_from(batches - 1)?;
        assert_eq!(elapsed, expected);
        Ok(())
    }

    #[tokio::test]
    async fn run_counts_mismatched_batch_and_keeps_going() -> TestResult {
        let dir = tempdir()?;
        write_pages(&dir.path().join("a.pdf"), 6, 40)?;
        let index = Arc::new(RecordingIndex::default());
        let embedder = Arc::new(ShortEmbedder {
            calls: AtomicUsize::new(0),
            short_on_call: 1,
        });
        let bootstrapper = Bootstrapper::new(embedder, index.clone(), options(dir.path(), DIM))?;

        let outcome = bootstrapper.run("legal").await?;

        let BootstrapOutcome::Completed {
            chunks,
            batches,
            skipped_batches,
            vectors_upserted,
            ..
        } = outcome
        else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert!(batches > 1);
        assert_eq!(skipped_batches, 1);
        assert_eq!(vectors_upserted, chunks - 5);
        assert_eq!(index.stored().len(), chunks - 5);
        Ok(())
    }

    #[tokio::test]
    async fn embedding_count_mismatch_skips_only_that_batch() -> TestResult {
        let index = Arc::new(RecordingIndex::default());
        let embedder = Arc::new(ShortEmbedder {
            calls: AtomicUsize::new(0),
            short_on_call: 1,
        });
        let dir = tempdir()?;
        let bootstrapper = Bootstrapper::new(embedder, index.clone(), options(dir.path(), DIM))?;

        let chunks = (0..12)
            .map(|n| Document::new(format!("chunk {n}"), Metadata::new()))
            .collect::<Vec<_>>();
        let mut results = Vec::new();
        for batch in chunks.chunks(5) {
            results.push(bootstrapper.ingest_batch("legal", batch).await?);
        }

        assert_eq!(
            results,
            vec![
                BatchResult::CountMismatch {
                    expected: 5,
                    received: 4
                },
                BatchResult::Upserted(5),
                BatchResult::Upserted(2),
            ]
        );
        assert_eq!(index.stored().len(), 7);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_dimension_is_never_stored() -> TestResult {
        let index = Arc::new(RecordingIndex::default());
        let dir = tempdir()?;
        let bootstrapper = Bootstrapper::new(
            Arc::new(CharacterNgramEmbedder { dimensions: DIM + 1 }),
            index.clone(),
            options(dir.path(), DIM),
        )?;

        let batch = vec![Document::new("indemnity", Metadata::new())];
        let result = bootstrapper.ingest_batch("legal", &batch).await?;

        assert_eq!(
            result,
            BatchResult::DimensionMismatch {
                expected: DIM,
                received: DIM + 1
            }
        );
        assert!(index.stored().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_chunks_never_reach_the_embedder() -> TestResult {
        let index = Arc::new(RecordingIndex::default());
        let embedder = Arc::new(ShortEmbedder {
            calls: AtomicUsize::new(0),
            short_on_call: 0,
        });
        let dir = tempdir()?;
        let bootstrapper =
            Bootstrapper::new(embedder.clone(), index.clone(), options(dir.path(), DIM))?;

        let batch = vec![
            Document::new("   ", Metadata::new()),
            Document::new("x".repeat(9_000), Metadata::new()),
        ];
        assert_eq!(
            bootstrapper.ingest_batch("legal", &batch).await?,
            BatchResult::Empty
        );
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn failed_upsert_does_not_abort_the_run() -> TestResult {
        let dir = tempdir()?;
        write_pages(&dir.path().join("a.pdf"), 4, 30)?;
        let index = Arc::new(RecordingIndex {
            fail_upsert_call: Some(1),
            ..Default::default()
        });
        let bootstrapper = Bootstrapper::new(
            Arc::new(CharacterNgramEmbedder { dimensions: DIM }),
            index.clone(),
            options(dir.path(), DIM),
        )?;

        let outcome = bootstrapper.run("legal").await?;

        let BootstrapOutcome::Completed {
            batches,
            skipped_batches,
            vectors_upserted,
            ..
        } = outcome
        else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert!(batches > 1);
        assert_eq!(skipped_batches, 1);
        assert_eq!(vectors_upserted, index.stored().len());
        Ok(())
    }

    #[tokio::test]
    async fn fifty_page_pdf_becomes_enriched_vectors() -> TestResult {
        let dir = tempdir()?;
        write_pages(&dir.path().join("master-lease.pdf"), 50, 30)?;
        std::fs::write(
            dir.path().join("db.json"),
            json!({
                "documents": [
                    {
                        "filename": "master-lease.pdf",
                        "title": "Master lease",
                        "date": "2020-01-15",
                        "tags": ["lease"]
                    }
                ]
            })
            .to_string(),
        )?;
        let index = Arc::new(RecordingIndex::default());
        let bootstrapper = Bootstrapper::new(
            Arc::new(CharacterNgramEmbedder::default()),
            index.clone(),
            BootstrapOptions {
                batch_pause: Duration::ZERO,
                docs_dir: dir.path().to_path_buf(),
                metadata_path: dir.path().join("db.json"),
                ..BootstrapOptions::default()
            },
        )?;

        let outcome = bootstrapper.run("legal").await?;

        let BootstrapOutcome::Completed {
            documents,
            chunks,
            skipped_batches,
            vectors_upserted,
            ..
        } = outcome
        else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert_eq!(documents, 50);
        assert!(chunks > documents);
        assert_eq!(skipped_batches, 0);
        assert_eq!(vectors_upserted, chunks);

        let batches = index.upsert_batches();
        assert!(batches.iter().all(|batch| batch.len() <= 2));

        let stored = index.stored();
        let ids = stored.iter().map(|record| record.id).collect::<HashSet<_>>();
        assert_eq!(ids.len(), stored.len());
        for record in &stored {
            assert_eq!(record.values.len(), 1024);
            let text = record.metadata.get_str(PAGE_CONTENT_KEY).unwrap_or_default();
            assert!(is_valid_content(text));
            assert!(text.chars().count() <= 1_000);
            assert_eq!(record.metadata.get_str(ID_KEY), Some(record.id.to_string().as_str()));
            assert_eq!(record.metadata.get(TOTAL_PAGES_KEY), Some(&json!(50)));
            assert_eq!(record.metadata.get_str("title"), Some("Master lease"));
            assert!(!record.metadata.contains_key("pdf"));
            assert!(!record.metadata.contains_key("loc"));
        }
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_index_is_a_connection_failure() -> TestResult {
        let dir = tempdir()?;
        let mut config = PineconeConfig::new("pc-key");
        config.controller_url = "http://127.0.0.1:1".to_string();
        let index = Arc::new(PineconeStore::new(reqwest::Client::new(), config));
        let bootstrapper = Bootstrapper::new(
            Arc::new(CharacterNgramEmbedder::default()),
            index,
            options(dir.path(), 1024),
        )?;

        let error = bootstrapper
            .run("legal")
            .await
            .expect_err("nothing listens on port 1");

        assert!(error.is_connection_timeout());
        Ok(())
    }
}
