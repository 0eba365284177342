pub mod bootstrap;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod metadata;
pub mod mmr;
pub mod models;
pub mod search;
pub mod stores;
pub mod traits;
pub mod validate;

pub use bootstrap::Bootstrapper;
pub use chunking::{ChunkingConfig, RecursiveCharacterSplitter};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, InputType, VoyageConfig, VoyageEmbedder,
    DEFAULT_VOYAGE_MODEL, DEFAULT_VOYAGE_URL,
};
pub use error::{EmbeddingError, IngestError, SearchError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor, PdfPages};
pub use loader::{discover_pdf_files, load_documents, load_documents_with, LoadReport, SkippedPdf};
pub use metadata::{apply_sidecar, flatten_metadata, read_metadata, MetadataRecord};
pub use mmr::{cosine_similarity, maximal_marginal_relevance};
pub use models::{
    BootstrapOptions, BootstrapOutcome, Document, Metadata, ScoredRecord, SearchHit,
    SearchOptions, VectorRecord, DEFAULT_INDEX_DIMENSION,
};
pub use search::{dedupe_by_id, SearchCoordinator};
pub use stores::{PineconeConfig, PineconeStore};
pub use traits::VectorIndex;
pub use validate::{is_valid_content, MAX_CONTENT_CHARS};
