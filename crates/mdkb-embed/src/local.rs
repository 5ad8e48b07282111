use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use anyhow::{Result, anyhow};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use mdkb_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

const DEFAULT_MODEL_DIR: &str = "models/bge-m3";

struct Loaded {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    hidden_size: usize,
}

/// Where the model files come from.
enum ModelSource {
    Dir(PathBuf),
    /// Located with `resolve_model_dir` when the model is first loaded.
    Resolve(Option<String>),
}

/// Local XLM-RoBERTa sentence embedder (BGE-M3 family), loaded on first use.
pub struct LocalEmbedder {
    source: ModelSource,
    max_len: usize,
    model_id: String,
    loaded: OnceLock<Loaded>,
}

impl LocalEmbedder {
    pub fn new(model_dir: PathBuf, max_len: usize) -> Self {
        let model_id = model_id_for(&model_dir);
        Self { source: ModelSource::Dir(model_dir), max_len, model_id, loaded: OnceLock::new() }
    }

    /// Defers locating the model directory until the model is needed.
    pub fn lazy(configured: Option<String>, max_len: usize) -> Self {
        let model_id = model_id_for(Path::new(configured.as_deref().unwrap_or(DEFAULT_MODEL_DIR)));
        Self { source: ModelSource::Resolve(configured), max_len, model_id, loaded: OnceLock::new() }
    }

    /// Hidden size of the loaded model, which is the embedding dimension.
    pub fn dimension(&self) -> Result<usize> { Ok(self.loaded()?.hidden_size) }

    fn loaded(&self) -> Result<&Loaded> {
        if let Some(l) = self.loaded.get() { return Ok(l); }
        let dir = match &self.source {
            ModelSource::Dir(dir) => dir.clone(),
            ModelSource::Resolve(configured) => resolve_model_dir(configured.as_deref())?,
        };
        let l = load(&dir)?;
        // A concurrent loader may have won the race; either copy is equivalent.
        Ok(self.loaded.get_or_init(|| l))
    }

    fn embed_text(&self, m: &Loaded, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&m.tokenizer, text, self.max_len, &m.device)?;
        let token_type_ids = Tensor::zeros((1, self.max_len), DType::I64, &m.device)?;
        let hidden = m.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let v: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if v.len() != m.hidden_size {
            return Err(anyhow!("embedding has {} dims, model hidden size is {}", v.len(), m.hidden_size));
        }
        let elapsed = start.elapsed().as_millis();
        if elapsed > 100 { debug!(elapsed_ms = elapsed, "slow embedding"); }
        Ok(v)
    }
}

impl Embedder for LocalEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn max_len(&self) -> usize { self.max_len }

    fn ensure_ready(&self) -> Result<()> { self.loaded().map(|_| ()) }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let m = self.loaded()?;
        texts.iter().map(|t| self.embed_text(m, t)).collect()
    }
}

fn model_id_for(dir: &Path) -> String {
    let name = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "model".to_string());
    format!("local:{}", name)
}

fn load(model_dir: &Path) -> Result<Loaded> {
    let device = select_device();
    info!(dir = %model_dir.display(), "Loading embedding model");

    let tokenizer_path = model_dir.join("tokenizer.json");
    let tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

    let config_path = model_dir.join("config.json");
    let config_text = std::fs::read_to_string(&config_path)
        .map_err(|e| anyhow!("Failed to read {}: {}", config_path.display(), e))?;
    let config: XLMRobertaConfig = serde_json::from_str(&config_text)?;
    let hidden_size = serde_json::from_str::<serde_json::Value>(&config_text)?
        .get("hidden_size")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;

    let weights = load_weights(model_dir, &device)?;
    let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
    let model = XLMRobertaModel::new(&config, vb)?;
    info!(hidden_size, "Embedding model loaded");
    Ok(Loaded { model, tokenizer, device, hidden_size })
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let bin = model_dir.join("pytorch_model.bin");
    if !bin.exists() {
        return Err(anyhow!("No model.safetensors or pytorch_model.bin in {}", model_dir.display()));
    }
    Ok(candle_core::pickle::read_all(&bin)?.into_iter().collect())
}

/// Locate the model directory: explicit setting, then `APP_MODEL_DIR`, `MODEL_DIR`,
/// then the conventional `models/bge-m3` locations.
pub fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = PathBuf::from(dir);
        if p.exists() { return Ok(p); }
        warn!(dir = %p.display(), "Configured model dir does not exist");
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { info!("Using {}: {}", var, p.display()); return Ok(p); }
        }
    }
    for candidate in [DEFAULT_MODEL_DIR, "../models/bge-m3"] {
        let p = Path::new(candidate);
        if p.exists() { return Ok(p.to_path_buf()); }
    }
    Err(anyhow!("Could not locate embedding model directory; set embedding.model_dir or APP_MODEL_DIR"))
}
