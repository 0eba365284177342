use crate::config::{EmbeddingProvider, Settings};
use async_trait::async_trait;
use casefile_core::{CharacterNgramEmbedder, Embedder, EmbeddingError, VoyageEmbedder};

/// Embedder picked at startup from `EMBEDDING_PROVIDER`.
pub enum AppEmbedder {
    Voyage(VoyageEmbedder),
    Ngram(CharacterNgramEmbedder),
}

impl AppEmbedder {
    pub fn from_settings(settings: &Settings, client: reqwest::Client) -> anyhow::Result<Self> {
        match settings.embedding_provider {
            EmbeddingProvider::Voyage => {
                let config = settings.voyage_config().ok_or_else(|| {
                    anyhow::anyhow!("VOYAGE_API_KEY is required when EMBEDDING_PROVIDER=voyage")
                })?;
                Ok(Self::Voyage(VoyageEmbedder::new(client, config)))
            }
            EmbeddingProvider::Ngram => Ok(Self::Ngram(CharacterNgramEmbedder {
                dimensions: settings.dimension,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Voyage(_) => "voyage",
            Self::Ngram(_) => "ngram",
        }
    }
}

#[async_trait]
impl Embedder for AppEmbedder {
    fn dimensions(&self) -> usize {
        match self {
            Self::Voyage(embedder) => embedder.dimensions(),
            Self::Ngram(embedder) => embedder.dimensions(),
        }
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match self {
            Self::Voyage(embedder) => embedder.embed_documents(texts).await,
            Self::Ngram(embedder) => embedder.embed_documents(texts).await,
        }
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            Self::Voyage(embedder) => embedder.embed_query(text).await,
            Self::Ngram(embedder) => embedder.embed_query(text).await,
        }
    }
}
