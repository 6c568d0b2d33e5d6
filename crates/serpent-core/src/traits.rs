use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Detection, IndexStats, Message, SearchHit, format_transcript};

/// Dense text encoder. Implementations must be deterministic for a fixed model
/// and return vectors of exactly `dim()` floats, one per input, in input order.
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Joint (query, passage) relevance model. Returns one score per passage.
pub trait CrossEncoder: Send + Sync {
    fn model_id(&self) -> &str;
    fn score_pairs(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;
}

/// Nearest-neighbour store shared by the local and remote backends.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append parallel arrays of vectors and their passage texts.
    async fn add(&self, vectors: &[Vec<f32>], texts: &[String]) -> Result<()>;
    /// Up to `k` hits, most similar first. Empty when nothing is stored.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;
    /// Make everything added so far durable.
    async fn persist(&self) -> Result<()>;
    /// Open a previously persisted snapshot. `Ok(false)` when there is none.
    async fn load(&self) -> Result<bool>;
    async fn stats(&self) -> Result<IndexStats>;
}

/// Black-box text completion service.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn summarize(&self, messages: &[Message]) -> Result<String> {
        self.generate(&summary_prompt(messages)).await
    }
}

/// External image classifier.
#[async_trait]
pub trait SpeciesClassifier: Send + Sync {
    async fn detect(&self, image: &[u8]) -> Result<Detection>;
}

pub fn summary_prompt(messages: &[Message]) -> String {
    format!(
        "Please provide a concise summary of the following conversation about snakes.\n\
         Focus on the main topics discussed, key questions asked, and important information provided.\n\
         Keep the summary under 200 words.\n\nConversation:\n{}\n\nSummary:",
        format_transcript(messages)
    )
}
