use std::path::{Path, PathBuf};
use tracing::info;

use serpent_core::config::{expand_path, EmbeddingSettings};
use serpent_core::traits::Embedder;
use serpent_core::{Error, Result};

mod batch;
mod device;
mod model;
mod pool;
mod tokenize;
mod weights;

pub use batch::BatchingEmbedder;
pub use device::select_device;
pub use model::EmbeddingModel;
pub use pool::masked_mean_l2;
pub use tokenize::{load_tokenizer, tokenize_batch, tokenize_pairs, EncodedBatch};
pub use weights::{load_var_builder, read_config};

impl Embedder for EmbeddingModel {
    fn model_id(&self) -> &str { EmbeddingModel::model_id(self) }
    fn dim(&self) -> usize { EmbeddingModel::dim(self) }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        EmbeddingModel::embed_batch(self, texts).map_err(|e| Error::ModelUnavailable(e.to_string()))
    }
}

/// Hashing bag-of-words encoder for tests and offline runs.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str { "fake-hash" }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Build the configured embedder wrapped for batching.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` swaps in [`FakeEmbedder`] at the configured dimension.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<BatchingEmbedder> {
    let inner: Box<dyn Embedder> = if env_flag("APP_USE_FAKE_EMBEDDINGS") {
        info!(dim = settings.dimension, "using FakeEmbedder");
        Box::new(FakeEmbedder::new(settings.dimension))
    } else {
        let dir = resolve_model_dir(settings.model_dir.as_deref(), &settings.model_id)?;
        let model = EmbeddingModel::new(&dir, &settings.model_id, settings.max_len)
            .map_err(|e| Error::ModelUnavailable(format!("{}: {}", settings.model_id, e)))?;
        Box::new(model)
    };
    Ok(BatchingEmbedder::new(inner, settings.batch_size))
}

/// Locate a local checkout of `model_id`: the configured dir, then
/// `APP_MODEL_DIR`/`MODEL_DIR`, then `models/<name>` relative to cwd or its parent.
pub fn resolve_model_dir(configured: Option<&str>, model_id: &str) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = expand_path(dir);
        if p.exists() { return Ok(p); }
        return Err(Error::ModelUnavailable(format!("model dir {} does not exist", p.display())));
    }
    let name = model_id.rsplit('/').next().unwrap_or(model_id);
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let base = expand_path(&dir);
            for p in [base.join(name), base] {
                if p.join("config.json").exists() { info!(var, dir = %p.display(), "using model dir"); return Ok(p); }
            }
        }
    }
    for root in [Path::new("models"), Path::new("../models")] {
        let p = root.join(name);
        if p.exists() { info!(dir = %p.display(), "using model dir"); return Ok(p); }
    }
    Err(Error::ModelUnavailable(format!("could not locate a local copy of {model_id}")))
}
