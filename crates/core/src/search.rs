use crate::embeddings::Embedder;
use crate::mmr::maximal_marginal_relevance;
use crate::models::{SearchHit, SearchOptions};
use crate::traits::VectorIndex;
use crate::SearchError;
use std::collections::HashSet;
use std::sync::Arc;

/// Read path: embed a query, fetch candidates, MMR re-rank, and drop duplicate records.
pub struct SearchCoordinator<E, V>
where
    E: Embedder,
    V: VectorIndex,
{
    embedder: Arc<E>,
    index: Arc<V>,
    index_name: String,
    options: SearchOptions,
}

impl<E, V> SearchCoordinator<E, V>
where
    E: Embedder,
    V: VectorIndex,
{
    pub fn new(embedder: Arc<E>, index: Arc<V>, index_name: impl Into<String>) -> Self {
        Self {
            embedder,
            index,
            index_name: index_name.into(),
            options: SearchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        tracing::info!(query, index = %self.index_name, "running similarity search");
        let query_vector = self.embedder.embed_query(query).await?;

        let fetch_k = self.options.fetch_k.max(self.options.k);
        let candidates = self
            .index
            .query(&self.index_name, &query_vector, fetch_k)
            .await?;

        let candidate_vectors = candidates
            .iter()
            .map(|candidate| candidate.values.clone())
            .collect::<Vec<_>>();
        let picks = maximal_marginal_relevance(
            &query_vector,
            &candidate_vectors,
            self.options.lambda,
            self.options.k,
        );

        let mut slots = candidates.into_iter().map(Some).collect::<Vec<_>>();
        let ranked = picks
            .into_iter()
            .filter_map(|position| slots.get_mut(position).and_then(Option::take))
            .map(SearchHit::from)
            .collect::<Vec<_>>();

        let total = ranked.len();
        let results = dedupe_by_id(ranked);
        tracing::debug!(retrieved = total, returned = results.len(), "search complete");
        Ok(results)
    }
}

/// Keep the first occurrence of every stable id, preserving order.
pub fn dedupe_by_id(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.stable_id().to_string()))
        .collect()
}
