use mdkb_core::config::EmbeddingSettings;
use mdkb_embed::embedder_from_settings;

fn main() -> anyhow::Result<()> {
    let embedder = embedder_from_settings(&EmbeddingSettings::default())?;
    let texts = vec!["hello world".to_string(), "rust embeddings".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("model={} B={} dim={}", embedder.model_id(), embs.len(), embs[0].len());
    Ok(())
}
