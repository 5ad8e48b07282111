//! Indexing, retrieval and retrieval-augmented answering over one collection.
use std::path::Path;
use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use mdkb_chat::OpenAiCompatClient;
use mdkb_core::config::{ChatOverrides, ChatSettings, Settings, SplitterConfig};
use mdkb_core::loader::{corpus_stats, load_markdown};
use mdkb_core::splitter::Splitter;
use mdkb_core::traits::{ChatModel, Embedder, VectorStore};
use mdkb_core::types::{Chunk, ChunkId, CollectionStats, IndexRecord, Metric, SearchResult, StoreHit, OUTPUT_FIELDS};
use mdkb_core::{Error, Result};
use mdkb_embed::embedder_from_settings;
use mdkb_vector::LanceStore;

use crate::outcome::{Answer, AskOutcome, BuildOutcome, IndexSummary};
use crate::prompt::rag_request;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub collection: String,
    pub splitter: SplitterConfig,
    pub batch_size: usize,
    pub top_k: usize,
}

impl Default for EngineSettings {
    fn default() -> Self { Self::from(&Settings::default()) }
}

impl From<&Settings> for EngineSettings {
    fn from(s: &Settings) -> Self {
        Self {
            collection: s.store.collection.clone(),
            splitter: s.splitter,
            batch_size: s.indexing.batch_size,
            top_k: s.retrieval.top_k,
        }
    }
}

/// Similarity reported to callers. Collections are created with the cosine
/// metric, whose distance is `1 - cos`.
pub fn similarity_from_distance(distance: f32) -> f32 { 1.0 - distance }

fn to_search_result(hit: StoreHit) -> SearchResult {
    SearchResult {
        id: hit.id,
        score: similarity_from_distance(hit.distance),
        text: hit.text.unwrap_or_default(),
        source_file: hit.source_file.unwrap_or_default(),
        file_path: hit.file_path.unwrap_or_default(),
        chunk_index: hit.chunk_index.unwrap_or_default(),
    }
}

/// Keeps typed errors raised inside collaborators, wraps everything else.
fn store_error(operation: &str, err: anyhow::Error) -> Error {
    match err.downcast::<Error>() {
        Ok(typed) => typed,
        Err(other) => Error::store(operation, format!("{:#}", other)),
    }
}

fn provider_error(operation: &str, err: anyhow::Error) -> Error {
    match err.downcast::<Error>() {
        Ok(typed) => typed,
        Err(other) => Error::provider(operation, format!("{:#}", other)),
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

pub struct QaEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    splitter: Splitter,
    settings: EngineSettings,
    chat: ChatSettings,
    chat_model: Mutex<Option<Arc<dyn ChatModel>>>,
}

impl QaEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        settings: EngineSettings,
        chat: ChatSettings,
    ) -> Result<Self> {
        if settings.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be greater than 0".into()));
        }
        let splitter = Splitter::new(settings.splitter)?;
        Ok(Self { embedder, store, splitter, settings, chat, chat_model: Mutex::new(None) })
    }

    /// Engine backed by the configured embedder and the on-disk LanceDB store.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let embedder = embedder_from_settings(&settings.embedding)?;
        let store: Arc<dyn VectorStore> = Arc::new(LanceStore::new(settings.store.db_path.clone()));
        Ok(Self::new(embedder, store, EngineSettings::from(settings), settings.chat.clone())?)
    }

    /// Use this chat model for every `ask_with_ai` call without overrides.
    pub fn with_chat_model(self, model: Arc<dyn ChatModel>) -> Self {
        Self { chat_model: Mutex::new(Some(model)), ..self }
    }

    pub fn settings(&self) -> &EngineSettings { &self.settings }

    pub fn collection(&self) -> &str { &self.settings.collection }

    /// Loads the embedding model now instead of on the first embed call.
    pub fn ensure_ready(&self) -> Result<()> {
        self.embedder.ensure_ready().map_err(|e| provider_error("embedder init", e))
    }

    pub async fn build_index(&self, root: &Path, recreate: bool) -> Result<BuildOutcome> {
        info!(dir = %root.display(), "Scanning for Markdown files");
        let documents = load_markdown(root)?;
        let corpus = corpus_stats(&documents);
        info!(
            files = corpus.total_files,
            chars = corpus.total_chars,
            avg_chars = corpus.avg_chars,
            "Loaded documents"
        );
        if documents.is_empty() {
            return Ok(BuildOutcome::NoDocuments {
                message: format!("No Markdown files found under {}", root.display()),
            });
        }

        let chunks = self.splitter.split_documents(&documents)?;
        info!(chunks = chunks.len(), "Split documents");
        drop(documents);

        let mut summary = IndexSummary {
            total_files: corpus.total_files,
            total_chunks: chunks.len(),
            vector_dimension: None,
            total_chars: corpus.total_chars,
            skipped_chunks: 0,
        };

        if chunks.is_empty() {
            if recreate && self.has_collection().await? {
                warn!(collection = self.collection(), "Dropping existing collection; no chunks to index");
                self.drop_collection().await?;
            }
            return Ok(BuildOutcome::Built(summary));
        }

        let pb = progress_bar(chunks.len());
        let mut dimension: Option<usize> = None;
        let mut id_offset: ChunkId = 0;
        let mut position: ChunkId = 0;
        let mut last_error: Option<Error> = None;
        for (batch_no, batch) in chunks.chunks(self.settings.batch_size).enumerate() {
            let vectors = match self.embed_batch(batch) {
                Ok(v) => v,
                Err(e) => {
                    // Skipped chunks consume no ids.
                    warn!(batch = batch_no + 1, chunks = batch.len(), "Skipping batch: {}", e);
                    summary.skipped_chunks += batch.len();
                    pb.inc(batch.len() as u64);
                    last_error = Some(e);
                    continue;
                }
            };

            let dim = match dimension {
                Some(d) => d,
                None => {
                    let d = vectors[0].len();
                    id_offset = self.prepare_collection(d, recreate).await?;
                    dimension = Some(d);
                    d
                }
            };

            let mut records = Vec::with_capacity(batch.len());
            for (chunk, vector) in batch.iter().zip(vectors) {
                if vector.len() != dim {
                    return Err(Error::DimensionMismatch { expected: dim, actual: vector.len() });
                }
                records.push(IndexRecord::from_chunk(id_offset + position, chunk, vector));
                position += 1;
            }
            self.store
                .insert(self.collection(), &records)
                .await
                .map_err(|e| store_error("insert", e))?;
            pb.inc(batch.len() as u64);
            debug!(batch = batch_no + 1, rows = records.len(), "Inserted batch");
        }
        pb.finish_with_message("indexing complete");

        if dimension.is_none() {
            if let Some(e) = last_error { return Err(e); }
        }
        summary.vector_dimension = dimension;
        info!(
            collection = self.collection(),
            chunks = summary.total_chunks,
            skipped = summary.skipped_chunks,
            dimension = dim_display(dimension),
            "Index built"
        );
        Ok(BuildOutcome::Built(summary))
    }

    fn embed_batch(&self, batch: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = batch.iter().map(|c| c.chunk_text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).map_err(|e| provider_error("embed", e))?;
        if vectors.len() != batch.len() {
            return Err(Error::provider("embed", format!("expected {} vectors, got {}", batch.len(), vectors.len())));
        }
        Ok(vectors)
    }

    /// Makes the collection ready for `dimension`-wide vectors and returns the first free id.
    async fn prepare_collection(&self, dimension: usize, recreate: bool) -> Result<ChunkId> {
        let name = self.collection();
        if self.has_collection().await? {
            if recreate {
                warn!(collection = name, "Dropping existing collection");
                self.drop_collection().await?;
            } else {
                let stats = self.stats().await?;
                if let Some(expected) = stats.dimension {
                    if expected != dimension {
                        return Err(Error::DimensionMismatch { expected, actual: dimension });
                    }
                }
                info!(collection = name, rows = stats.row_count, "Appending to existing collection");
                return Ok(stats.row_count as ChunkId);
            }
        }
        self.store
            .create_collection(name, dimension, Metric::Cosine)
            .await
            .map_err(|e| store_error("create collection", e))?;
        Ok(0)
    }

    async fn has_collection(&self) -> Result<bool> {
        self.store.has_collection(self.collection()).await.map_err(|e| store_error("has collection", e))
    }

    async fn drop_collection(&self) -> Result<()> {
        self.store.drop_collection(self.collection()).await.map_err(|e| store_error("drop collection", e))
    }

    /// Up to `top_k` chunks most similar to `question`, best first.
    pub async fn query(&self, question: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 { return Ok(Vec::new()); }
        let stats = self.stats().await?;
        if !stats.exists || stats.row_count == 0 {
            debug!(collection = self.collection(), "Collection missing or empty");
            return Ok(Vec::new());
        }
        let query = self.embedder.embed_one(question).map_err(|e| provider_error("embed", e))?;
        let hits = self
            .store
            .search(self.collection(), &query, top_k, &OUTPUT_FIELDS)
            .await
            .map_err(|e| store_error("search", e))?;
        Ok(hits.into_iter().take(top_k).map(to_search_result).collect())
    }

    pub async fn stats(&self) -> Result<CollectionStats> {
        self.store.stats(self.collection()).await.map_err(|e| store_error("stats", e))
    }

    pub async fn ask_with_ai(&self, question: &str, top_k: usize, overrides: &ChatOverrides) -> Result<AskOutcome> {
        let contexts = self.query(question, top_k).await?;
        if contexts.is_empty() {
            return Ok(AskOutcome::NoContext);
        }
        let client = match self.chat_client(overrides) {
            Ok(c) => c,
            Err(error) => return Ok(AskOutcome::Failed { error, contexts }),
        };
        let request = rag_request(question, &contexts);
        debug!(model = client.model(), contexts = contexts.len(), "Asking chat model");
        match client.complete(&request).await {
            Ok(completion) => Ok(AskOutcome::Answered(Answer {
                answer: completion.content,
                model: completion.model,
                usage: completion.usage,
                contexts,
            })),
            Err(e) => {
                let error = provider_error("chat completion", e);
                warn!("Chat completion failed: {}", error);
                Ok(AskOutcome::Failed { error, contexts })
            }
        }
    }

    fn chat_client(&self, overrides: &ChatOverrides) -> Result<Arc<dyn ChatModel>> {
        if !overrides.is_empty() {
            let settings = self.chat.with_overrides(overrides);
            return Ok(Arc::new(OpenAiCompatClient::new(&settings)?));
        }
        let mut cached = self
            .chat_model
            .lock()
            .map_err(|_| Error::provider("chat client", "client cache lock poisoned"))?;
        if let Some(client) = cached.as_ref() {
            return Ok(Arc::clone(client));
        }
        let client: Arc<dyn ChatModel> = Arc::new(OpenAiCompatClient::new(&self.chat)?);
        *cached = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Releases the store connection.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await.map_err(|e| store_error("close", e))
    }
}

fn dim_display(dimension: Option<usize>) -> String {
    dimension.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_one_minus_distance() {
        assert_eq!(similarity_from_distance(0.0), 1.0);
        assert!((similarity_from_distance(0.25) - 0.75).abs() < 1e-6);
        assert_eq!(similarity_from_distance(2.0), -1.0);
    }

    #[test]
    fn missing_fields_map_to_empty_values() {
        let r = to_search_result(StoreHit { id: 3, distance: 0.5, ..Default::default() });
        assert_eq!(r.id, 3);
        assert_eq!(r.score, 0.5);
        assert!(r.text.is_empty());
        assert_eq!(r.chunk_index, 0);
    }

    #[test]
    fn typed_errors_survive_wrapping() {
        let err = store_error("insert", Error::DimensionMismatch { expected: 3, actual: 2 }.into());
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
        let err = store_error("insert", anyhow::anyhow!("disk full"));
        assert!(matches!(err, Error::Store { ref operation, .. } if operation == "insert"));
    }
}
