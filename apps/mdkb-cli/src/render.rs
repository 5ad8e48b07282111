use mdkb_core::types::{CollectionStats, SearchResult, Usage};
use mdkb_engine::{Answer, IndexSummary};

/// First `max` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() { format!("{}...", head) } else { head }
}

pub fn summary(s: &IndexSummary) -> String {
    let dim = s.vector_dimension.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    format!(
        "Index built\n  files:      {}\n  chunks:     {}\n  skipped:    {}\n  dimension:  {}\n  characters: {}",
        s.total_files, s.total_chunks, s.skipped_chunks, dim, s.total_chars
    )
}

pub fn results(results: &[SearchResult]) -> String {
    let mut out = format!("Found {} relevant results:\n", results.len());
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "\n[{}] score {:.2} | {} #{}\n{}\n",
            i + 1,
            r.score,
            r.source_file,
            r.chunk_index,
            preview(&r.text, 300)
        ));
    }
    out
}

fn usage(u: &Usage) -> String {
    format!("Tokens: prompt {} | completion {} | total {}", u.prompt_tokens, u.completion_tokens, u.total_tokens)
}

pub fn answer(a: &Answer) -> String {
    let mut out = format!("Answer ({}):\n\n{}\n\n{}\n\nReferences ({}):", a.model, a.answer, usage(&a.usage), a.context_count());
    for (i, c) in a.contexts.iter().enumerate() {
        out.push_str(&format!("\n[{}] score {:.2} | {}\n    {}", i + 1, c.score, c.source_file, preview(&c.text, 150)));
    }
    out
}

pub fn stats(name: &str, s: &CollectionStats) -> String {
    let status = if s.exists { "built" } else { "not built" };
    let dim = s.dimension.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    format!("Collection: {}\n  status:    {}\n  chunks:    {}\n  dimension: {}", name, status, s.row_count, dim)
}
