//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `OPENAI_*` + `APP_*` env vars (nested keys use `__`, e.g.
//! `APP_SPLITTER__CHUNK_SIZE=800`). Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// API keys that are shipped in sample configs and never valid.
const PLACEHOLDER_KEYS: [&str; 2] = ["your-api-key-here", "sk-..."];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Directory holding `tokenizer.json`, `config.json` and the weights.
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub use_fake: bool,
    pub fake_dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self { Self { model_dir: None, max_len: 256, use_fake: false, fake_dim: 768 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub db_path: String,
    pub collection: String,
}

impl Default for StoreSettings {
    fn default() -> Self { Self { db_path: "./data/lancedb".into(), collection: "md_knowledge_base".into() } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Upper bound on chunk length, in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive windows of one section.
    pub chunk_overlap: usize,
    /// Documents longer than this are skipped with a split error.
    pub max_document_chars: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self { Self { chunk_size: 500, chunk_overlap: 50, max_document_chars: 20_000_000 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    pub batch_size: usize,
}

impl Default for IndexingSettings {
    fn default() -> Self { Self { batch_size: 100 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { top_k: 5 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            model: "gpt-3.5-turbo".into(),
            temperature: 0.7,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

/// Per-call replacements for the configured chat endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatOverrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl ChatOverrides {
    pub fn is_empty(&self) -> bool { self.base_url.is_none() && self.api_key.is_none() && self.model.is_none() }
}

impl ChatSettings {
    pub fn with_overrides(&self, overrides: &ChatOverrides) -> Self {
        let mut out = self.clone();
        if let Some(url) = &overrides.base_url { out.base_url = url.clone(); }
        if let Some(key) = &overrides.api_key { out.api_key = Some(key.clone()); }
        if let Some(model) = &overrides.model { out.model = model.clone(); }
        out
    }

    /// The API key, or a `Config` error with a remediation hint when it is unset or a placeholder.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() && !PLACEHOLDER_KEYS.contains(&key) => Ok(key),
            _ => Err(Error::Config {
                message: "chat API key is not set".into(),
                hint: "Set chat.api_key in config.toml, export OPENAI_API_KEY, or pass --api-key".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub store: StoreSettings,
    pub splitter: SplitterConfig,
    pub indexing: IndexingSettings,
    pub retrieval: RetrievalSettings,
    pub chat: ChatSettings,
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment
            .merge(Env::raw().only(&["OPENAI_API_KEY", "OPENAI_BASE_URL", "OPENAI_MODEL"]).map(|key| {
                match key.as_str() {
                    "OPENAI_API_KEY" | "openai_api_key" => "chat.api_key".into(),
                    "OPENAI_BASE_URL" | "openai_base_url" => "chat.base_url".into(),
                    _ => "chat.model".into(),
                }
            }))
            .merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration with paths expanded.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.store.db_path = expand_path(&settings.store.db_path).to_string_lossy().into_owned();
        settings.embedding.model_dir = settings
            .embedding
            .model_dir
            .map(|d| expand_path(d).to_string_lossy().into_owned());
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let s = self.settings()?;
        if s.splitter.chunk_size == 0 {
            return Err(Error::InvalidConfig("splitter.chunk_size must be greater than 0".into()).into());
        }
        if s.indexing.batch_size == 0 {
            return Err(Error::InvalidConfig("indexing.batch_size must be greater than 0".into()).into());
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
