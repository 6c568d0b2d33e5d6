//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`APP_RERANK__ALPHA=0.5` sets `rerank.alpha`). Settings are validated once at
//! load time and are read-only afterwards.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already assembled figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub rerank: RerankSettings,
    pub memory: MemorySettings,
    pub vector_store: VectorStoreSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_id: String,
    pub model_dir: Option<String>,
    pub dimension: usize,
    pub batch_size: usize,
    pub max_len: usize,
    pub query_prefix: String,
    pub passage_prefix: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_id: "intfloat/multilingual-e5-small".to_string(),
            model_dir: None,
            dimension: 384,
            batch_size: 32,
            max_len: 512,
            query_prefix: "query: ".to_string(),
            passage_prefix: "passage: ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    Words,
    Chars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPolicy {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkPolicy {
    pub const fn new(chunk_size: usize, overlap: usize) -> Self { Self { chunk_size, overlap } }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidInput("chunk_size must be positive".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::InvalidInput(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn step(&self) -> usize { self.chunk_size - self.overlap }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub unit: ChunkUnit,
    pub default: ChunkPolicy,
    pub fields: BTreeMap<String, ChunkPolicy>,
}

impl ChunkingSettings {
    /// Policy for a named field, falling back to the global default.
    pub fn policy_for(&self, field: &str) -> ChunkPolicy {
        self.fields.get(field).copied().unwrap_or(self.default)
    }
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        // Sized at roughly two thirds of each field's average length.
        let table = [
            ("Symptoms when bitten", 300, 80),
            ("How to handle", 300, 80),
            ("Morphological characteristics", 280, 70),
            ("Scientific and common names", 200, 50),
            ("Habitat", 150, 40),
            ("Behavior and ecology", 150, 40),
            ("Predation behavior", 140, 35),
            ("Taxonomy", 130, 35),
            ("Researcher observations", 130, 35),
            ("Toxicity", 120, 30),
            ("Reproduction", 110, 30),
            ("Conservation status", 150, 30),
            ("Research value", 150, 30),
            ("Human relevance", 150, 30),
        ];
        Self {
            unit: ChunkUnit::Words,
            default: ChunkPolicy::new(200, 50),
            fields: table
                .into_iter()
                .map(|(name, size, overlap)| (name.to_string(), ChunkPolicy::new(size, overlap)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub enabled: bool,
    pub model_id: String,
    pub model_dir: Option<String>,
    /// Weight of the cross-encoder score in the fused score.
    pub alpha: f32,
    pub rerank_top_k: usize,
    pub final_top_k: usize,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model_id: "cross-encoder/ms-marco-MiniLM-L-12-v2".to_string(),
            model_dir: None,
            alpha: 0.7,
            rerank_top_k: 15,
            final_top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    pub summary_threshold: usize,
    pub recent_window: usize,
    /// Re-summarize after this many further messages. `None` keeps the first
    /// summary until a manual regenerate.
    pub resummarize_every: Option<usize>,
    pub regenerate_min_messages: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self { summary_threshold: 4, recent_window: 3, resummarize_every: None, regenerate_min_messages: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Lance,
    Qdrant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub backend: VectorBackend,
    pub collection: String,
    pub lance_dir: String,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Lance,
            collection: "snake_knowledge_base".to_string(),
            lance_dir: "data/indexes/lancedb".to_string(),
            qdrant_url: None,
            qdrant_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
            timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Context size when re-ranking is not in effect.
    pub top_k: usize,
    pub index_timeout_secs: u64,
    /// Bound on each index write during ingestion.
    pub ingest_timeout_secs: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { top_k: 5, index_timeout_secs: 30, ingest_timeout_secs: 600 } }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if self.embedding.dimension == 0 { return invalid("embedding.dimension must be positive".into()); }
        if self.embedding.batch_size == 0 { return invalid("embedding.batch_size must be positive".into()); }

        self.chunking
            .default
            .validate()
            .map_err(|e| Error::InvalidConfig(format!("chunking.default: {}", e)))?;
        for (field, policy) in &self.chunking.fields {
            policy
                .validate()
                .map_err(|e| Error::InvalidConfig(format!("chunking.fields.{}: {}", field, e)))?;
        }

        if !(0.0..=1.0).contains(&self.rerank.alpha) {
            return invalid(format!("rerank.alpha must be within [0, 1], got {}", self.rerank.alpha));
        }
        if self.rerank.final_top_k == 0 { return invalid("rerank.final_top_k must be positive".into()); }
        if self.rerank.final_top_k > self.rerank.rerank_top_k {
            return invalid(format!(
                "rerank.final_top_k ({}) cannot exceed rerank.rerank_top_k ({})",
                self.rerank.final_top_k, self.rerank.rerank_top_k
            ));
        }

        if self.memory.summary_threshold == 0 { return invalid("memory.summary_threshold must be positive".into()); }
        if self.memory.recent_window == 0 { return invalid("memory.recent_window must be positive".into()); }
        if self.memory.resummarize_every == Some(0) {
            return invalid("memory.resummarize_every must be positive when set".into());
        }

        if self.vector_store.collection.trim().is_empty() {
            return invalid("vector_store.collection must not be empty".into());
        }
        if self.vector_store.backend == VectorBackend::Qdrant && self.vector_store.qdrant_url.is_none() {
            return invalid("vector_store.qdrant_url is required for the qdrant backend".into());
        }

        if self.retrieval.top_k == 0 { return invalid("retrieval.top_k must be positive".into()); }
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

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
