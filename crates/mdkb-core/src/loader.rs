//! Recursive Markdown discovery.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{CorpusStats, Document};

/// Load every `*.md` file under `root`, sorted by path.
///
/// Files that cannot be read as UTF-8 text are logged and skipped.
pub fn load_markdown(root: &Path) -> Result<Vec<Document>> {
    if !root.exists() {
        return Err(Error::NotFound(format!("directory does not exist: {}", root.display())));
    }
    let mut documents = Vec::new();
    for path in list_md_files(root) {
        match read_document(&path) {
            Ok(doc) => documents.push(doc),
            Err(e) if e.is_recoverable() => warn!("Skipping unreadable file: {}", e),
            Err(e) => return Err(e),
        }
    }
    debug!(count = documents.len(), root = %root.display(), "loaded markdown documents");
    Ok(documents)
}

pub fn read_document(path: &Path) -> Result<Document> {
    let content = fs::read_to_string(path).map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Document { content, file_path: absolute.to_string_lossy().into_owned(), file_name })
}

/// Character totals over a set of documents.
pub fn corpus_stats(documents: &[Document]) -> CorpusStats {
    let total_chars: usize = documents.iter().map(|d| d.content.chars().count()).sum();
    CorpusStats {
        total_files: documents.len(),
        total_chars,
        avg_chars: if documents.is_empty() { 0 } else { total_chars / documents.len() },
    }
}

fn list_md_files(root: &Path) -> Vec<PathBuf> {
    let mut md_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => { warn!("Skipping directory entry: {}", e); continue; }
        };
        if !entry.file_type().is_file() { continue; }
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("md") { md_files.push(path.to_path_buf()); }
    }
    md_files.sort();
    md_files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_average_over_documents() {
        let docs = vec![
            Document { content: "abcd".into(), file_path: "/a.md".into(), file_name: "a.md".into() },
            Document { content: "你好".into(), file_path: "/b.md".into(), file_name: "b.md".into() },
        ];
        let stats = corpus_stats(&docs);
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_chars, 6);
        assert_eq!(stats.avg_chars, 3);
        assert_eq!(corpus_stats(&[]).avg_chars, 0);
    }
}
