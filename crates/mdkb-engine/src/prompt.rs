use mdkb_core::types::{ChatMessage, ChatRequest, SearchResult};

pub const SYSTEM_PROMPT: &str = "You are a technical documentation assistant. Answer the user's question using the provided references.

Requirements:
1. Base the answer only on the provided references.
2. If the references do not contain the relevant information, say so explicitly.
3. Be accurate, clear and well organized.
4. Cite the reference numbers you used where possible.";

/// Numbered reference block, one entry per context, separated by blank lines.
pub fn format_references(contexts: &[SearchResult]) -> String {
    contexts
        .iter()
        .enumerate()
        .map(|(i, c)| format!("Reference {}:\n{}", i + 1, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn rag_request(question: &str, contexts: &[SearchResult]) -> ChatRequest {
    let user = format!(
        "References:\n{}\n\nQuestion: {}\n\nAnswer the question based on the references above.",
        format_references(contexts),
        question
    );
    ChatRequest { messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)], ..Default::default() }
}
