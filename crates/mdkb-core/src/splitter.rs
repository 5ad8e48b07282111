//! Markdown-aware chunking.
//!
//! Two stages per document:
//! 1. `split_by_headings` cuts the text into sections, one per ATX heading
//!    (plus the preamble before the first heading).
//! 2. `Splitter::split_section` cuts oversized sections into overlapping
//!    windows of at most `chunk_size` characters, ending each window just after
//!    the strongest nearby delimiter.
//!
//! All lengths and offsets are counted in `char`s, not bytes.
use tracing::{info, warn};

use crate::config::SplitterConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// How far back from a window's end a delimiter is looked for.
pub const SEARCH_MARGIN: usize = 200;

/// Break delimiters, strongest first.
pub const DELIMITERS: [&str; 8] = ["\n\n", "\n", "。", "！", "？", ".", "!", "?"];

#[derive(Debug, Clone)]
pub struct Splitter {
    config: SplitterConfig,
}

impl Splitter {
    pub fn new(config: SplitterConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than 0".into()));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SplitterConfig { &self.config }

    /// Split every document. Documents that fail on their own are logged and skipped.
    pub fn split_documents(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut all_chunks = Vec::new();
        for (doc_index, doc) in documents.iter().enumerate() {
            if (doc_index + 1) % 20 == 0 || doc_index == 0 {
                info!("Splitting document {}/{}: {}", doc_index + 1, documents.len(), doc.file_name);
            }
            match self.split_document(doc) {
                Ok(chunks) => all_chunks.extend(chunks),
                Err(e) if e.is_recoverable() => warn!(file = %doc.file_name, "Skipping document: {}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(all_chunks)
    }

    pub fn split_document(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let char_count = doc.content.chars().count();
        if char_count > self.config.max_document_chars {
            return Err(Error::Split {
                file: doc.file_name.clone(),
                message: format!(
                    "document has {} characters, limit is {}",
                    char_count, self.config.max_document_chars
                ),
            });
        }
        let mut chunks = Vec::new();
        for section in split_by_headings(&doc.content) {
            for piece in self.split_section(&section) {
                if piece.trim().is_empty() { continue; }
                chunks.push(Chunk {
                    chunk_text: piece,
                    source_file: doc.file_name.clone(),
                    file_path: doc.file_path.clone(),
                    chunk_index: chunks.len(),
                });
            }
        }
        Ok(chunks)
    }

    /// Size-split one section. Sections that already fit are returned untouched.
    pub fn split_section(&self, section: &str) -> Vec<String> {
        let chars: Vec<char> = section.chars().collect();
        let len = chars.len();
        let chunk_size = self.config.chunk_size;
        if len <= chunk_size {
            return vec![section.to_string()];
        }

        let mut pieces = Vec::new();
        let mut start = 0usize;
        while start < len {
            let mut end = (start + chunk_size).min(len);
            if end < len {
                if let Some(better) = find_break(&chars, start, end) { end = better; }
            }

            let piece: String = chars[start..end].iter().collect();
            let trimmed = piece.trim();
            if !trimmed.is_empty() { pieces.push(trimmed.to_string()); }

            if end >= len { break; }
            // A window shorter than the overlap would not move `start`; jump to `end` instead.
            let next = end.saturating_sub(self.config.chunk_overlap);
            start = if next <= start { end } else { next };
        }
        pieces
    }
}

/// Stage A: one section per heading line, preamble first. Whitespace-only sections are dropped.
pub fn split_by_headings(content: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in content.split('\n') {
        if is_heading(line) && !current.is_empty() {
            sections.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        sections.push(current.join("\n"));
    }
    sections.retain(|s| !s.trim().is_empty());
    sections
}

fn is_heading(line: &str) -> bool {
    !line.trim().is_empty() && line.trim_start().starts_with('#')
}

/// New window end just past the strongest delimiter in the last `SEARCH_MARGIN`
/// chars of `[start, end)`; within one delimiter kind the latest occurrence wins.
fn find_break(chars: &[char], start: usize, end: usize) -> Option<usize> {
    let lo = start.max(end.saturating_sub(SEARCH_MARGIN));
    DELIMITERS.iter().find_map(|delim| {
        let pat: Vec<char> = delim.chars().collect();
        rfind_chars(chars, &pat, lo, end)
            .filter(|&idx| idx > start)
            .map(|idx| idx + pat.len())
    })
}

fn rfind_chars(hay: &[char], pat: &[char], lo: usize, hi: usize) -> Option<usize> {
    if pat.is_empty() || hi < lo + pat.len() { return None; }
    (lo..=hi - pat.len()).rev().find(|&i| hay[i..i + pat.len()] == *pat)
}
