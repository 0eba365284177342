use casefile_core::{
    BootstrapOptions, PineconeConfig, SearchOptions, VoyageConfig, DEFAULT_INDEX_DIMENSION,
    DEFAULT_VOYAGE_MODEL, DEFAULT_VOYAGE_URL,
};
use casefile_core::stores::DEFAULT_CONTROLLER_URL;
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingProvider {
    /// Voyage AI hosted embeddings (needs `VOYAGE_API_KEY`).
    Voyage,
    /// Local character n-gram hashing, for offline runs.
    Ngram,
}

/// Runtime settings. Every flag can also come from the environment or a `.env` file.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Pinecone API key.
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true)]
    pub pinecone_api_key: String,

    /// Index that receives the corpus and serves queries.
    #[arg(long, env = "PINECONE_INDEX", default_value = "casefile")]
    pub pinecone_index: String,

    /// Namespace inside the index. Empty means the default namespace.
    #[arg(long, env = "PINECONE_NAMESPACE", default_value = "")]
    pub pinecone_namespace: String,

    /// Pinecone control plane.
    #[arg(long, env = "PINECONE_CONTROLLER_URL", default_value = DEFAULT_CONTROLLER_URL)]
    pub pinecone_controller_url: String,

    #[arg(long, env = "PINECONE_CLOUD", default_value = "aws")]
    pub pinecone_cloud: String,

    #[arg(long, env = "PINECONE_REGION", default_value = "us-east-1")]
    pub pinecone_region: String,

    #[arg(
        long,
        env = "EMBEDDING_PROVIDER",
        value_enum,
        default_value_t = EmbeddingProvider::Voyage
    )]
    pub embedding_provider: EmbeddingProvider,

    #[arg(long, env = "VOYAGE_API_KEY", hide_env_values = true)]
    pub voyage_api_key: Option<String>,

    #[arg(long, env = "VOYAGE_MODEL", default_value = DEFAULT_VOYAGE_MODEL)]
    pub voyage_model: String,

    #[arg(long, env = "VOYAGE_URL", default_value = DEFAULT_VOYAGE_URL)]
    pub voyage_url: String,

    /// Vector dimension of the index and of every embedding.
    #[arg(long, env = "EMBEDDING_DIMENSION", default_value_t = DEFAULT_INDEX_DIMENSION)]
    pub dimension: usize,

    /// Folder scanned recursively for PDFs.
    #[arg(long, env = "DOCS_DIR", default_value = "docs")]
    pub docs_dir: PathBuf,

    /// Sidecar metadata file. Defaults to `<docs_dir>/db.json`.
    #[arg(long, env = "METADATA_FILE")]
    pub metadata_file: Option<PathBuf>,

    /// Host (or full base URL) that `/bootstrap` forwards ingestion jobs to.
    #[arg(long, env = "PRODUCTION_URL")]
    pub production_url: Option<String>,

    #[arg(long, env = "BATCH_PAUSE_MS", default_value_t = 1_000)]
    pub batch_pause_ms: u64,

    #[arg(long, env = "HTTP_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    #[arg(long, env = "HTTP_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,
}

impl Settings {
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()
    }

    pub fn pinecone_config(&self) -> PineconeConfig {
        let mut config = PineconeConfig::new(self.pinecone_api_key.clone());
        config.controller_url = self.pinecone_controller_url.clone();
        config.namespace = self.pinecone_namespace.clone();
        config.cloud = self.pinecone_cloud.clone();
        config.region = self.pinecone_region.clone();
        config
    }

    pub fn voyage_config(&self) -> Option<VoyageConfig> {
        let key = self.voyage_api_key.as_deref().filter(|key| !key.trim().is_empty())?;
        let mut config = VoyageConfig::new(key);
        config.base_url = self.voyage_url.clone();
        config.model = self.voyage_model.clone();
        config.dimensions = self.dimension;
        Some(config)
    }

    pub fn bootstrap_options(&self) -> BootstrapOptions {
        let metadata_path = self
            .metadata_file
            .clone()
            .unwrap_or_else(|| self.docs_dir.join("db.json"));
        BootstrapOptions {
            docs_dir: self.docs_dir.clone(),
            metadata_path,
            dimension: self.dimension,
            batch_pause: Duration::from_millis(self.batch_pause_ms),
            ..BootstrapOptions::default()
        }
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions::default()
    }

    /// Where `/bootstrap` forwards jobs, if anywhere.
    pub fn forward_ingest_url(&self) -> Option<String> {
        self.production_url
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(ingest_url)
    }
}

/// A bare host is reached over https; an explicit scheme is kept as given.
pub fn ingest_url(production_url: &str) -> String {
    let base = production_url.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}/ingest")
    } else {
        format!("https://{base}/ingest")
    }
}
