//! Second-stage relevance scoring: a cross-encoder reads each (query, passage)
//! pair jointly and its score is fused with the first-stage similarity.

use tracing::{debug, info};

use serpent_core::config::RerankSettings;
use serpent_core::traits::CrossEncoder;
use serpent_core::types::{RerankedHit, SearchHit};
use serpent_core::{Error, Result};
use serpent_embed::{env_flag, resolve_model_dir};

mod cross_encoder;
mod lexical;

pub use cross_encoder::BertCrossEncoder;
pub use lexical::LexicalScorer;

const CROSS_ENCODER_MAX_LEN: usize = 512;

pub struct Reranker {
    model: Box<dyn CrossEncoder>,
}

impl Reranker {
    pub fn new(model: Box<dyn CrossEncoder>) -> Self { Self { model } }

    pub fn model_id(&self) -> &str { self.model.model_id() }

    /// Score `candidates` against `query`, fuse with their original scores and
    /// keep the best `top_k`.
    pub fn rerank(&self, query: &str, candidates: &[SearchHit], alpha: f32, top_k: usize) -> Result<Vec<RerankedHit>> {
        check_alpha(alpha)?;
        if candidates.is_empty() || top_k == 0 { return Ok(Vec::new()); }
        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let scores = self.model.score_pairs(query, &texts)?;
        if scores.len() != candidates.len() {
            return Err(Error::ModelUnavailable(format!(
                "{} scored {} of {} candidates",
                self.model.model_id(), scores.len(), candidates.len()
            )));
        }
        let hits = fuse(candidates, &scores, alpha, top_k)?;
        debug!(candidates = candidates.len(), kept = hits.len(), alpha, "reranked");
        Ok(hits)
    }
}

fn check_alpha(alpha: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(Error::InvalidInput(format!("alpha must be within [0,1], got {alpha}")));
    }
    Ok(())
}

/// `combined = alpha * ce + (1 - alpha) * original`, sorted descending.
/// The sort is stable, so ties keep retrieval order.
pub fn fuse(candidates: &[SearchHit], ce_scores: &[f32], alpha: f32, top_k: usize) -> Result<Vec<RerankedHit>> {
    check_alpha(alpha)?;
    if ce_scores.len() != candidates.len() {
        return Err(Error::InvalidInput(format!(
            "{} scores for {} candidates", ce_scores.len(), candidates.len()
        )));
    }
    let mut hits: Vec<RerankedHit> = candidates
        .iter()
        .zip(ce_scores)
        .map(|(c, &ce)| RerankedHit {
            text: c.text.clone(),
            cross_encoder_score: ce,
            original_score: c.score,
            combined_score: alpha * ce + (1.0 - alpha) * c.score,
        })
        .collect();
    hits.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    hits.truncate(top_k);
    Ok(hits)
}

/// Load the configured cross-encoder. `APP_USE_FAKE_RERANKER=1` selects
/// [`LexicalScorer`].
pub fn load_default_cross_encoder(settings: &RerankSettings) -> Result<Box<dyn CrossEncoder>> {
    if env_flag("APP_USE_FAKE_RERANKER") {
        info!("using LexicalScorer in place of the cross-encoder");
        return Ok(Box::new(LexicalScorer));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref(), &settings.model_id)?;
    let model = BertCrossEncoder::new(&dir, &settings.model_id, CROSS_ENCODER_MAX_LEN)
        .map_err(|e| Error::ModelUnavailable(format!("{}: {}", settings.model_id, e)))?;
    Ok(Box::new(model))
}
