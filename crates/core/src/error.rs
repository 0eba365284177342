use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("index error: {0}")]
    Index(#[from] SearchError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl IngestError {
    /// True when the failure came from not being able to reach a remote service in time.
    pub fn is_connection_timeout(&self) -> bool {
        match self {
            Self::Index(error) => error.is_connection_timeout(),
            Self::Embedding(error) => error.is_connection_timeout(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("store not available yet: {0}")]
    NotReady(String),

    #[error("query is required")]
    EmptyQuery,

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl SearchError {
    pub fn is_connection_timeout(&self) -> bool {
        match self {
            Self::Http(error) => is_connect_or_timeout(error),
            Self::Embedding(error) => error.is_connection_timeout(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding provider returned {status}: {details}")]
    Provider { status: u16, details: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

impl EmbeddingError {
    pub fn is_connection_timeout(&self) -> bool {
        matches!(self, Self::Http(error) if is_connect_or_timeout(error))
    }
}

fn is_connect_or_timeout(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
