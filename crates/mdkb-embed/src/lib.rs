//! Text embedders: a local candle XLM-RoBERTa model and a hashing embedder.
#![deny(unused_imports)]

mod device;
mod hash;
mod local;
mod pool;
mod tokenize;

use std::sync::Arc;

use tracing::info;

use mdkb_core::config::EmbeddingSettings;
use mdkb_core::traits::Embedder;

pub use device::select_device;
pub use hash::HashEmbedder;
pub use local::{resolve_model_dir, LocalEmbedder};
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

fn fake_requested(settings: &EmbeddingSettings) -> bool {
    settings.use_fake
        || std::env::var("APP_USE_FAKE_EMBEDDINGS")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
}

/// Build the embedder the settings ask for. The local model is not loaded until first use.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> anyhow::Result<Arc<dyn Embedder>> {
    if fake_requested(settings) {
        info!(dim = settings.fake_dim, "Using hash embedder");
        return Ok(Arc::new(HashEmbedder::new(settings.fake_dim)));
    }
    Ok(Arc::new(LocalEmbedder::lazy(settings.model_dir.clone(), settings.max_len)))
}
