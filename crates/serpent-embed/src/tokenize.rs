use anyhow::{anyhow, bail, Result};
use candle_core::{Device, Tensor};
use std::path::Path;
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Token tensors for one forward pass, all shaped `[B,T]`.
pub struct EncodedBatch {
    pub input_ids: Tensor,
    pub token_type_ids: Tensor,
    pub attention_mask: Tensor,
}

/// Load `tokenizer.json` with truncation at `max_len` and padding to the
/// longest sequence of each batch.
pub fn load_tokenizer(path: &Path, max_len: usize) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
    let (pad_id, pad_token) = ["<pad>", "[PAD]"]
        .iter()
        .find_map(|t| tokenizer.token_to_id(t).map(|id| (id, t.to_string())))
        .unwrap_or((0, "[PAD]".to_string()));
    tokenizer
        .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
        .map_err(|e| anyhow!("Invalid truncation settings: {}", e))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        pad_id,
        pad_token,
        ..Default::default()
    }));
    Ok(tokenizer)
}

pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], device: &Device) -> Result<EncodedBatch> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    to_tensors(&encodings, device)
}

/// Encode `(query, passage)` pairs as single sequences with segment ids.
pub fn tokenize_pairs(tokenizer: &Tokenizer, query: &str, passages: &[String], device: &Device) -> Result<EncodedBatch> {
    let pairs: Vec<(String, String)> = passages.iter().map(|p| (query.to_string(), p.clone())).collect();
    let encodings = tokenizer
        .encode_batch(pairs, true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    to_tensors(&encodings, device)
}

fn to_tensors(encodings: &[Encoding], device: &Device) -> Result<EncodedBatch> {
    let batch = encodings.len();
    let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
    if batch == 0 || seq_len == 0 { bail!("nothing to encode"); }
    let mut ids = Vec::with_capacity(batch * seq_len);
    let mut type_ids = Vec::with_capacity(batch * seq_len);
    let mut mask = Vec::with_capacity(batch * seq_len);
    for enc in encodings {
        if enc.get_ids().len() != seq_len { bail!("ragged batch: padding is not configured"); }
        ids.extend_from_slice(enc.get_ids());
        type_ids.extend_from_slice(enc.get_type_ids());
        mask.extend_from_slice(enc.get_attention_mask());
    }
    Ok(EncodedBatch {
        input_ids: Tensor::from_vec(ids, (batch, seq_len), device)?,
        token_type_ids: Tensor::from_vec(type_ids, (batch, seq_len), device)?,
        attention_mask: Tensor::from_vec(mask, (batch, seq_len), device)?,
    })
}
