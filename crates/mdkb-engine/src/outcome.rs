use mdkb_core::types::{SearchResult, Usage};
use mdkb_core::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub total_files: usize,
    pub total_chunks: usize,
    /// `None` when no chunk was embedded.
    pub vector_dimension: Option<usize>,
    pub total_chars: usize,
    /// Chunks whose embedding batch failed and was skipped.
    pub skipped_chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built(IndexSummary),
    NoDocuments { message: String },
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool { matches!(self, Self::Built(_)) }

    pub fn summary(&self) -> Option<&IndexSummary> {
        match self {
            Self::Built(s) => Some(s),
            Self::NoDocuments { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub model: String,
    pub usage: Usage,
    pub contexts: Vec<SearchResult>,
}

impl Answer {
    pub fn context_count(&self) -> usize { self.contexts.len() }
}

/// Result of a retrieval-augmented question.
#[derive(Debug)]
pub enum AskOutcome {
    Answered(Answer),
    /// Retrieval found nothing; the chat model was not called.
    NoContext,
    /// Retrieval succeeded but the chat step did not. Contexts are kept for display.
    Failed { error: Error, contexts: Vec<SearchResult> },
}

impl AskOutcome {
    pub fn is_success(&self) -> bool { matches!(self, Self::Answered(_)) }

    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Answered(_) => None,
            Self::NoContext => Some("No relevant content found in the knowledge base".to_string()),
            Self::Failed { error, .. } => Some(error.to_string()),
        }
    }

    pub fn contexts(&self) -> &[SearchResult] {
        match self {
            Self::Answered(a) => &a.contexts,
            Self::NoContext => &[],
            Self::Failed { contexts, .. } => contexts,
        }
    }

    pub fn context_count(&self) -> usize { self.contexts().len() }
}
