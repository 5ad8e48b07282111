use mdkb_core::config::EmbeddingSettings;
use mdkb_core::traits::Embedder;
use mdkb_embed::{embedder_from_settings, HashEmbedder, LocalEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { use_fake: true, fake_dim: 1024, ..Default::default() };
    let embedder = embedder_from_settings(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
    assert_eq!(embedder.model_id(), "hash:1024");
}

#[test]
fn shared_words_are_closer() {
    let e = HashEmbedder::new(256);
    let q = e.embed_one("vector database search").unwrap();
    let near = e.embed_one("a vector database supports similarity search").unwrap();
    let far = e.embed_one("bread recipes with butter").unwrap();
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn local_embedder_reports_missing_files_lazily() {
    let tmp = tempfile::TempDir::new().unwrap();
    let e = LocalEmbedder::new(tmp.path().to_path_buf(), 32);
    assert_eq!(e.max_len(), 32);
    assert!(e.ensure_ready().is_err(), "no tokenizer.json in an empty dir");
    assert!(e.embed_batch(&["x".to_string()]).is_err());
}

#[test]
fn default_settings_defer_model_lookup() {
    let model_env = ["APP_MODEL_DIR", "MODEL_DIR", "APP_USE_FAKE_EMBEDDINGS"];
    if model_env.iter().any(|v| std::env::var_os(v).is_some()) || std::path::Path::new("models/bge-m3").exists() {
        return;
    }
    let embedder = embedder_from_settings(&EmbeddingSettings::default()).expect("construction does not touch the model");
    assert_eq!(embedder.model_id(), "local:bge-m3");
    let err = embedder.ensure_ready().unwrap_err();
    assert!(err.to_string().contains("Could not locate embedding model directory"), "{err}");
}

#[test]
fn configured_dir_is_loaded_on_first_use() {
    let tmp = tempfile::TempDir::new().unwrap();
    let settings = EmbeddingSettings { model_dir: Some(tmp.path().display().to_string()), ..Default::default() };
    let embedder = embedder_from_settings(&settings).expect("embedder");
    let err = embedder.ensure_ready().unwrap_err();
    assert!(err.to_string().contains("tokenizer"), "{err}");
}

#[test]
#[ignore = "needs a local BGE-M3 model directory (APP_MODEL_DIR)"]
fn local_model_embeds_normalized_vectors() {
    let dir = mdkb_embed::resolve_model_dir(None).expect("model dir");
    let e = LocalEmbedder::new(dir, 128);
    e.ensure_ready().expect("load");
    let dim = e.dimension().expect("dimension");
    let v = e.embed_one("hello world").expect("embed");
    assert_eq!(v.len(), dim);
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3);
}
