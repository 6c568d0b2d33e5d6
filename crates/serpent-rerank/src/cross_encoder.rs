use anyhow::Result;
use candle_core::{Device, IndexOp, Module};
use candle_nn::{linear, Linear};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::info;

use serpent_core::traits::CrossEncoder;
use serpent_core::{Error, Result as CoreResult};
use serpent_embed::{load_tokenizer, load_var_builder, read_config, select_device, tokenize_pairs};

/// BERT sequence-classification head (`ms-marco-MiniLM` style) scoring
/// `[CLS] query [SEP] passage [SEP]` into a probability in `[0,1]`.
pub struct BertCrossEncoder {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
}

impl BertCrossEncoder {
    pub fn new(model_dir: &Path, model_id: &str, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(model = model_id, dir = %model_dir.display(), "loading cross-encoder");
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"), max_len)?;
        let (config, raw): (BertConfig, serde_json::Value) = read_config(model_dir)?;
        let hidden = raw.get("hidden_size").and_then(|v| v.as_u64()).unwrap_or(384) as usize;
        let vb = load_var_builder(model_dir, &device)?;
        let bert = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = linear(hidden, hidden, vb.pp("bert.pooler.dense"))?;
        let classifier = linear(hidden, 1, vb.pp("classifier"))?;
        Ok(Self { bert, pooler, classifier, tokenizer, device, model_id: model_id.to_string() })
    }

    pub fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        if passages.is_empty() { return Ok(Vec::new()); }
        let batch = tokenize_pairs(&self.tokenizer, query, passages, &self.device)?;
        let hidden = self.bert.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?.squeeze(1)?;
        let probs = candle_nn::ops::sigmoid(&logits)?;
        Ok(probs.to_device(&Device::Cpu)?.to_vec1::<f32>()?)
    }
}

impl CrossEncoder for BertCrossEncoder {
    fn model_id(&self) -> &str { &self.model_id }
    fn score_pairs(&self, query: &str, passages: &[String]) -> CoreResult<Vec<f32>> {
        self.score(query, passages).map_err(|e| Error::ModelUnavailable(format!("{}: {}", self.model_id, e)))
    }
}
