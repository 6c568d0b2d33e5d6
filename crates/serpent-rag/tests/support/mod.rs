#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serpent_core::config::Settings;
use serpent_core::traits::{CrossEncoder, Generator, SpeciesClassifier, VectorIndex};
use serpent_core::types::{Detection, IndexStats, SearchHit, SpeciesDocument};
use serpent_core::{Error, Result};
use serpent_embed::{BatchingEmbedder, FakeEmbedder};
use serpent_rag::{RagService, RerankerState};
use serpent_rerank::{LexicalScorer, Reranker};

pub const DIM: usize = 384;

pub fn embedder() -> BatchingEmbedder {
    BatchingEmbedder::new(Box::new(FakeEmbedder::new(DIM)), 8)
}

pub fn lexical() -> RerankerState {
    RerankerState::Ready(Reranker::new(Box::new(LexicalScorer)))
}

/// Returns canned hits in a fixed order whatever the query; records each `k`.
pub struct FixedIndex {
    pub hits: Vec<SearchHit>,
    pub requested: Mutex<Vec<usize>>,
    pub has_snapshot: bool,
}

impl FixedIndex {
    pub fn new(hits: Vec<SearchHit>) -> Arc<Self> {
        Arc::new(Self { hits, requested: Mutex::new(Vec::new()), has_snapshot: true })
    }

    pub fn empty_store() -> Arc<Self> {
        Arc::new(Self { hits: Vec::new(), requested: Mutex::new(Vec::new()), has_snapshot: false })
    }

    pub fn last_k(&self) -> Option<usize> { self.requested.lock().unwrap().last().copied() }
}

#[async_trait]
impl VectorIndex for FixedIndex {
    async fn add(&self, _vectors: &[Vec<f32>], _texts: &[String]) -> Result<()> { Ok(()) }

    async fn search(&self, _query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.requested.lock().unwrap().push(k);
        Ok(self.hits.iter().take(k).cloned().collect())
    }

    async fn persist(&self) -> Result<()> { Ok(()) }

    async fn load(&self) -> Result<bool> { Ok(self.has_snapshot) }

    async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats { vector_count: self.hits.len(), dimension: DIM, backend: "fixed".into(), collection: "test".into() })
    }
}

/// An index whose writes never complete.
pub struct StalledIndex;

#[async_trait]
impl VectorIndex for StalledIndex {
    async fn add(&self, _vectors: &[Vec<f32>], _texts: &[String]) -> Result<()> { std::future::pending().await }

    async fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<SearchHit>> { Ok(Vec::new()) }

    async fn persist(&self) -> Result<()> { std::future::pending().await }

    async fn load(&self) -> Result<bool> { Ok(false) }

    async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats { vector_count: 0, dimension: DIM, backend: "stalled".into(), collection: "test".into() })
    }
}

/// Fifteen candidates; the venom passage sits last with the lowest similarity.
pub fn cobra_pool() -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = (0..14)
        .map(|i| SearchHit {
            text: format!("Python regius {i} - Habitat: savanna grassland burrows"),
            score: 0.9 - i as f32 * 0.01,
        })
        .collect();
    hits.push(SearchHit { text: "Naja naja - Toxicity: the cobra is highly venomous".into(), score: 0.3 });
    hits
}

/// Records every prompt; answers summaries with "summary" and other prompts
/// with "answer N".
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<String>>,
    pub fail_first: AtomicUsize,
    pub failure: Mutex<Option<fn() -> Error>>,
}

impl RecordingGenerator {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Fail the first `n` calls with `failure`.
    pub fn failing(n: usize, failure: fn() -> Error) -> Arc<Self> {
        let g = Self::default();
        g.fail_first.store(n, Ordering::SeqCst);
        *g.failure.lock().unwrap() = Some(failure);
        Arc::new(g)
    }

    pub fn calls(&self) -> usize { self.prompts.lock().unwrap().len() }

    pub fn last_prompt(&self) -> String { self.prompts.lock().unwrap().last().cloned().unwrap_or_default() }

    pub fn answer_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().iter().filter(|p| !is_summary(p)).cloned().collect()
    }
}

fn is_summary(prompt: &str) -> bool { prompt.contains("Keep the summary under 200 words") }

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let n = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };
        if self.fail_first.load(Ordering::SeqCst) > 0 {
            self.fail_first.fetch_sub(1, Ordering::SeqCst);
            let failure = self.failure.lock().unwrap().expect("failure set");
            return Err(failure());
        }
        if is_summary(prompt) { Ok("summary".to_string()) } else { Ok(format!("answer {n}")) }
    }
}

pub struct FixedClassifier(pub &'static str);

#[async_trait]
impl SpeciesClassifier for FixedClassifier {
    async fn detect(&self, _image: &[u8]) -> Result<Detection> {
        Ok(Detection { predicted_class: self.0.to_string(), probability: 0.93 })
    }
}

pub struct BrokenCrossEncoder;

impl CrossEncoder for BrokenCrossEncoder {
    fn model_id(&self) -> &str { "broken" }
    fn score_pairs(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>> {
        Err(Error::ModelUnavailable("cross-encoder crashed".into()))
    }
}

pub fn service(index: Arc<dyn VectorIndex>, reranker: RerankerState, generator: Arc<dyn Generator>) -> RagService {
    RagService::new(Settings::default(), embedder(), index, reranker, generator).expect("service")
}

pub fn species() -> Vec<SpeciesDocument> {
    let mut cobra = BTreeMap::new();
    cobra.insert("Toxicity".to_string(), "The Indian cobra is highly venomous; its neurotoxic venom causes paralysis.".to_string());
    cobra.insert("Habitat".to_string(), "Found in open forests, farmland and villages across South Asia.".to_string());
    let mut python = BTreeMap::new();
    python.insert("Habitat".to_string(), "Ball pythons live in grassland and savanna burrows of West Africa.".to_string());
    python.insert("Toxicity".to_string(), "Non-venomous constrictor that kills prey by squeezing.".to_string());
    vec![
        SpeciesDocument { name: "Naja naja".into(), fields: cobra },
        SpeciesDocument { name: "Python regius".into(), fields: python },
    ]
}
