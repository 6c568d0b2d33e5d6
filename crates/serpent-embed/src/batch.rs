use serpent_core::traits::Embedder;
use serpent_core::{Error, Result};

/// Splits large inputs into model-sized batches and checks every output.
///
/// Batching never changes results: text `i` maps to the same vector whatever
/// batch it lands in.
pub struct BatchingEmbedder {
    inner: Box<dyn Embedder>,
    batch_size: usize,
}

impl BatchingEmbedder {
    pub fn new(inner: Box<dyn Embedder>, batch_size: usize) -> Self {
        Self { inner, batch_size: batch_size.max(1) }
    }

    pub fn batch_size(&self) -> usize { self.batch_size }

    pub fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let vectors = self.inner.embed_batch(chunk)?;
            if vectors.len() != chunk.len() {
                return Err(Error::ModelUnavailable(format!(
                    "{} returned {} vectors for {} texts",
                    self.inner.model_id(), vectors.len(), chunk.len()
                )));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != self.inner.dim()) {
                return Err(Error::ModelUnavailable(format!(
                    "{} returned a {}-d vector, expected {}",
                    self.inner.model_id(), bad.len(), self.inner.dim()
                )));
            }
            out.extend(vectors);
        }
        Ok(out)
    }

    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_many(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::ModelUnavailable(format!("{} returned no vector", self.inner.model_id())))
    }
}

impl Embedder for BatchingEmbedder {
    fn model_id(&self) -> &str { self.inner.model_id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { self.embed_many(texts) }
}
