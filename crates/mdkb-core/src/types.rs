//! Domain types shared by the loader, splitter, stores and the engine.

use serde::{Deserialize, Serialize};

/// Primary key of an indexed chunk; also its position in the indexing run.
pub type ChunkId = i64;

pub const FIELD_TEXT: &str = "text";
pub const FIELD_SOURCE_FILE: &str = "source_file";
pub const FIELD_FILE_PATH: &str = "file_path";
pub const FIELD_CHUNK_INDEX: &str = "chunk_index";

/// Stored fields returned with every retrieval hit.
pub const OUTPUT_FIELDS: [&str; 4] = [FIELD_TEXT, FIELD_SOURCE_FILE, FIELD_FILE_PATH, FIELD_CHUNK_INDEX];

/// A Markdown file as read from disk.
///
/// - `file_path`: absolute path
/// - `file_name`: final path component, used as `source_file` on chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub file_path: String,
    pub file_name: String,
}

/// A bounded span of document text, the unit of embedding and retrieval.
///
/// `chunk_index` counts emitted chunks within one document starting at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_text: String,
    pub source_file: String,
    pub file_path: String,
    pub chunk_index: usize,
}

/// A row written to the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: ChunkId,
    pub vector: Vec<f32>,
    pub text: String,
    pub source_file: String,
    pub file_path: String,
    pub chunk_index: usize,
}

impl IndexRecord {
    pub fn from_chunk(id: ChunkId, chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id,
            vector,
            text: chunk.chunk_text.clone(),
            source_file: chunk.source_file.clone(),
            file_path: chunk.file_path.clone(),
            chunk_index: chunk.chunk_index,
        }
    }
}

/// Distance metric a collection is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    L2,
    Dot,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::L2 => "l2",
            Metric::Dot => "dot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Some(Metric::Cosine),
            "l2" => Some(Metric::L2),
            "dot" => Some(Metric::Dot),
            _ => None,
        }
    }
}

/// Raw hit returned by a store search. Lower `distance` is better.
///
/// Stored fields are `Some` only when requested through `output_fields`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreHit {
    pub id: ChunkId,
    pub distance: f32,
    pub text: Option<String>,
    pub source_file: Option<String>,
    pub file_path: Option<String>,
    pub chunk_index: Option<usize>,
}

/// A ranked retrieval result. `score` is higher-is-better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: ChunkId,
    pub score: f32,
    pub text: String,
    pub source_file: String,
    pub file_path: String,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    pub exists: bool,
    pub row_count: usize,
    pub dimension: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_files: usize,
    pub total_chars: usize,
    pub avg_chars: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self { Self { role: Role::System, content: content.into() } }
    pub fn user(content: impl Into<String>) -> Self { Self { role: Role::User, content: content.into() } }
}

/// Sampling parameters are optional; clients fall back to their configured defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub content: String,
    pub model: String,
    pub usage: Usage,
}
