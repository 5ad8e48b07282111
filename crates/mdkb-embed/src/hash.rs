use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use mdkb_core::traits::Embedder;

/// Deterministic bag-of-tokens embedder for tests and offline runs.
///
/// ASCII words and individual non-ASCII characters are hashed into `dim`
/// buckets and the counts are L2-normalized. Texts sharing words land close
/// together under cosine distance.
pub struct HashEmbedder {
    dim: usize,
    model_id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, model_id: format!("hash:{}", dim) }
    }

    pub fn dim(&self) -> usize { self.dim }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() % self.dim as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            v[0] = 1.0;
        } else {
            for x in &mut v { *x /= norm; }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

fn tokens(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut word_start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_ascii_alphanumeric() {
            word_start.get_or_insert(i);
            continue;
        }
        if let Some(s) = word_start.take() { out.push(&text[s..i]); }
        if !c.is_ascii() && c.is_alphanumeric() { out.push(&text[i..i + c.len_utf8()]); }
    }
    if let Some(s) = word_start { out.push(&text[s..]); }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_split_words_and_cjk_chars() {
        assert_eq!(tokens("Rust is fast"), vec!["Rust", "is", "fast"]);
        assert_eq!(tokens("向量db, ok!"), vec!["向", "量", "db", "ok"]);
        assert!(tokens("  ... ").is_empty());
    }

    #[test]
    fn empty_text_is_still_unit_length() {
        let v = HashEmbedder::new(8).embed("");
        assert_eq!(v[0], 1.0);
        assert_eq!(v.iter().filter(|x| **x != 0.0).count(), 1);
    }
}
