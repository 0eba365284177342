use crate::models::{ScoredRecord, VectorRecord};
use crate::SearchError;
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the index with the given dimension; an index that already exists is not an error.
    async fn create_index_if_absent(
        &self,
        index_name: &str,
        dimension: usize,
    ) -> Result<(), SearchError>;

    /// Whether the index holds at least one record. Failures to read stats count as `false`.
    async fn has_vectors(&self, index_name: &str) -> bool;

    async fn upsert(&self, index_name: &str, records: &[VectorRecord]) -> Result<(), SearchError>;

    /// Upsert in sequential sub-batches of `batch_size` records.
    async fn upsert_batched(
        &self,
        index_name: &str,
        records: &[VectorRecord],
        batch_size: usize,
    ) -> Result<(), SearchError> {
        for (position, batch) in records.chunks(batch_size.max(1)).enumerate() {
            tracing::debug!(
                index = index_name,
                sub_batch = position + 1,
                vectors = batch.len(),
                "upserting vectors"
            );
            self.upsert(index_name, batch).await?;
        }
        Ok(())
    }

    /// Nearest records to `vector`, best first, including their stored values.
    async fn query(
        &self,
        index_name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, SearchError>;
}
