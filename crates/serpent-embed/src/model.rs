use anyhow::{anyhow, Result};
use candle_core::Device;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::path::Path;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{info, warn};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{load_tokenizer, tokenize_batch};
use crate::weights::{load_var_builder, read_config};

/// Sentence encoder backed by a BERT-family checkpoint (multilingual-e5 by default).
pub struct EmbeddingModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dim: usize,
}

impl EmbeddingModel {
    pub fn new(model_dir: &Path, model_id: &str, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(model = model_id, dir = %model_dir.display(), "loading embedding model");
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"), max_len)?;
        let (config, raw): (BertConfig, serde_json::Value) = read_config(model_dir)?;
        let dim = raw
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;
        let vb = load_var_builder(model_dir, &device)?;
        let model = BertModel::load(vb, &config)?;
        info!(model = model_id, dim, "embedding model ready");
        Ok(Self { model, tokenizer, device, model_id: model_id.to_string(), dim })
    }

    pub fn model_id(&self) -> &str { &self.model_id }

    pub fn dim(&self) -> usize { self.dim }

    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let batch = tokenize_batch(&self.tokenizer, texts, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        let elapsed = start.elapsed().as_millis();
        if elapsed > 1000 { warn!(batch = texts.len(), elapsed_ms = elapsed as u64, "slow embedding batch"); }
        Ok(vectors)
    }
}
