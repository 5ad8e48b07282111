use async_trait::async_trait;

use crate::types::{ChatCompletion, ChatRequest, ChunkId, CollectionStats, IndexRecord, Metric, StoreHit};

pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `local:bge-m3`).
    fn model_id(&self) -> &str;
    fn max_len(&self) -> usize;
    /// One-time model load. Called lazily by `embed_batch`; call it eagerly to pay the cost up front.
    fn ensure_ready(&self) -> anyhow::Result<()> { Ok(()) }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// The narrow surface the engine needs from a vector database.
///
/// A store holds named collections of fixed dimension. `search` returns hits
/// ordered by ascending distance under the collection's metric.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn has_collection(&self, name: &str) -> anyhow::Result<bool>;
    async fn create_collection(&self, name: &str, dimension: usize, metric: Metric) -> anyhow::Result<()>;
    /// Irreversibly removes the collection and every record in it.
    async fn drop_collection(&self, name: &str) -> anyhow::Result<()>;
    async fn insert(&self, name: &str, records: &[IndexRecord]) -> anyhow::Result<Vec<ChunkId>>;
    async fn search(
        &self,
        name: &str,
        query: &[f32],
        limit: usize,
        output_fields: &[&str],
    ) -> anyhow::Result<Vec<StoreHit>>;
    async fn stats(&self, name: &str) -> anyhow::Result<CollectionStats>;
    /// Releases the connection handle. The next call reopens it.
    async fn close(&self) -> anyhow::Result<()> { Ok(()) }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model(&self) -> &str;
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<ChatCompletion>;
}
