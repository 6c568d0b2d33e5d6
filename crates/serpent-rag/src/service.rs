use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use serpent_core::chunker::Chunker;
use serpent_core::config::{RerankSettings, Settings};
use serpent_core::traits::{Embedder, Generator, VectorIndex};
use serpent_core::types::{IndexStats, Message, SearchHit, SpeciesDocument};
use serpent_core::{Error, Result};
use serpent_embed::{get_default_embedder, BatchingEmbedder};
use serpent_rerank::{load_default_cross_encoder, Reranker};
use serpent_vector::open_index;

use crate::generation::ResilientGenerator;
use crate::prompt::{description_search, species_question_search, PromptInput, PromptStrategy};

/// Whether second-stage scoring can run.
pub enum RerankerState {
    Ready(Reranker),
    /// Turned off in configuration.
    Disabled,
    /// Enabled but the model could not be loaded.
    Unavailable(String),
}

impl RerankerState {
    pub fn from_settings(settings: &RerankSettings) -> Self {
        if !settings.enabled { return RerankerState::Disabled; }
        match load_default_cross_encoder(settings) {
            Ok(model) => RerankerState::Ready(Reranker::new(model)),
            Err(e) => {
                warn!(model = %settings.model_id, error = %e, "cross-encoder unavailable, falling back to similarity order");
                RerankerState::Unavailable(e.to_string())
            }
        }
    }

    fn fallback_reason(&self) -> Option<String> {
        match self {
            RerankerState::Ready(_) => None,
            RerankerState::Disabled => Some("reranking disabled in configuration".to_string()),
            RerankerState::Unavailable(reason) => Some(format!("reranker unavailable: {reason}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    Text { question: String },
    /// Species recognised from an image, no question asked.
    Image { species: String },
    ImageQuestion { species: String, question: String },
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub mode: QueryMode,
    pub history: Vec<Message>,
    pub summary: Option<String>,
    /// Context size when re-ranking is not in effect; defaults to `retrieval.top_k`.
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn text(question: impl Into<String>) -> Self {
        Self { mode: QueryMode::Text { question: question.into() }, history: Vec::new(), summary: None, top_k: None }
    }
}

/// How the final context was ranked.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RerankInfo {
    pub reranking_used: bool,
    /// Set whenever similarity order was used instead of fused scores.
    pub fallback_reason: Option<String>,
    pub original_retrieval_count: usize,
    pub final_count: usize,
    pub cross_encoder_scores: Vec<f32>,
    pub original_scores: Vec<f32>,
    pub combined_scores: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Retrieval {
    pub search: String,
    pub context: Vec<String>,
    /// Combined scores when re-ranked, similarity scores otherwise.
    pub scores: Vec<f32>,
    pub rerank_info: RerankInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub context: Vec<String>,
    pub scores: Vec<f32>,
    pub rerank_info: RerankInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestStats {
    pub documents: usize,
    pub chunks: usize,
    pub embeddings: usize,
    pub index: IndexStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerankStatus {
    pub enabled: bool,
    pub model_id: String,
    pub rerank_top_k: usize,
    pub final_top_k: usize,
    pub alpha: f32,
    pub loaded: bool,
    pub unavailable_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStats {
    pub indexed: bool,
    pub index: IndexStats,
    pub embedding_model: String,
    pub reranking: RerankStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentReport {
    pub embedder: bool,
    pub chunker: bool,
    pub index: bool,
    pub generator: bool,
}

impl ComponentReport {
    pub fn all_passed(&self) -> bool { self.embedder && self.chunker && self.index && self.generator }
}

/// Retrieval-augmented answering over the species knowledge base.
///
/// Built once at startup and shared behind an `Arc`; holds the loaded models.
pub struct RagService {
    settings: Settings,
    chunker: Chunker,
    embedder: BatchingEmbedder,
    index: Arc<dyn VectorIndex>,
    reranker: RerankerState,
    generator: Arc<dyn Generator>,
    indexed: AtomicBool,
}

impl RagService {
    /// Assemble from parts. The generator is wrapped with the configured
    /// timeout and retries.
    pub fn new(
        settings: Settings,
        embedder: BatchingEmbedder,
        index: Arc<dyn VectorIndex>,
        reranker: RerankerState,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        settings.validate()?;
        if embedder.dim() != settings.embedding.dimension {
            return Err(Error::InvalidConfig(format!(
                "embedder {} produces {}-d vectors, embedding.dimension is {}",
                embedder.model_id(), embedder.dim(), settings.embedding.dimension
            )));
        }
        let generator: Arc<dyn Generator> = Arc::new(ResilientGenerator::new(generator, &settings.generation));
        Ok(Self {
            chunker: Chunker::new(settings.chunking.clone()),
            settings,
            embedder,
            index,
            reranker,
            generator,
            indexed: AtomicBool::new(false),
        })
    }

    /// Load models and open the configured index; relative paths resolve against `base_dir`.
    pub async fn from_settings(settings: Settings, base_dir: &Path, generator: Arc<dyn Generator>) -> Result<Self> {
        let embedder = get_default_embedder(&settings.embedding)?;
        let index = open_index(&settings.vector_store, base_dir, settings.embedding.dimension).await?;
        let reranker = RerankerState::from_settings(&settings.rerank);
        Self::new(settings, embedder, index, reranker, generator)
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    /// The timeout- and retry-wrapped generator, also used for summaries.
    pub fn generator(&self) -> Arc<dyn Generator> { self.generator.clone() }

    pub fn is_indexed(&self) -> bool { self.indexed.load(Ordering::SeqCst) }

    pub fn reranking_active(&self) -> bool { matches!(self.reranker, RerankerState::Ready(_)) }

    async fn index_call<T>(&self, operation: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        Self::bounded(operation, self.settings.retrieval.index_timeout_secs, call).await
    }

    async fn bounded<T>(operation: &str, secs: u64, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(Duration::from_secs(secs), call)
            .await
            .map_err(|_| Error::Timeout { operation: operation.to_string(), secs })?
    }

    /// Chunk, embed and index species records.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn ingest(&self, documents: &[SpeciesDocument]) -> Result<IngestStats> {
        let mut passages = Vec::new();
        for doc in documents {
            for chunk in self.chunker.chunk_document(doc)? {
                passages.push(chunk.contextualized(&doc.name));
            }
        }
        if passages.is_empty() {
            return Err(Error::InvalidInput("no chunks produced from the given documents".into()));
        }
        info!(documents = documents.len(), chunks = passages.len(), "embedding passages");
        let inputs: Vec<String> =
            passages.iter().map(|p| format!("{}{}", self.settings.embedding.passage_prefix, p)).collect();
        let vectors = self.embedder.embed_many(&inputs)?;
        let write_secs = self.settings.retrieval.ingest_timeout_secs;
        Self::bounded("index add", write_secs, self.index.add(&vectors, &passages)).await?;
        Self::bounded("index persist", write_secs, self.index.persist()).await?;
        let index = self.index_call("index stats", self.index.stats()).await?;
        self.indexed.store(index.vector_count > 0, Ordering::SeqCst);
        info!(vectors = index.vector_count, backend = %index.backend, "ingestion complete");
        Ok(IngestStats { documents: documents.len(), chunks: passages.len(), embeddings: vectors.len(), index })
    }

    /// Open a previous snapshot. `Ok(false)` leaves the service unindexed:
    /// queries then fail with `NoIndexAvailable`.
    pub async fn load_existing_index(&self) -> Result<bool> {
        let loaded = self.index_call("index load", self.index.load()).await?;
        self.indexed.store(loaded, Ordering::SeqCst);
        if loaded { info!("existing index loaded"); } else { warn!("no existing index; ingest documents before querying"); }
        Ok(loaded)
    }

    /// Retrieve the context for `search`, re-ranked when possible.
    #[instrument(skip(self))]
    pub async fn retrieve(&self, search: &str, top_k: Option<usize>) -> Result<Retrieval> {
        if !self.is_indexed() { return Err(Error::NoIndexAvailable); }
        if search.trim().is_empty() { return Err(Error::InvalidInput("empty search string".into())); }
        let top_k = top_k.unwrap_or(self.settings.retrieval.top_k);
        if top_k == 0 { return Err(Error::InvalidInput("top_k must be positive".into())); }

        let rerank = &self.settings.rerank;
        let width = if self.reranking_active() { rerank.rerank_top_k } else { top_k };
        let query = self.embedder.embed_one(&format!("{}{}", self.settings.embedding.query_prefix, search))?;
        let candidates = self.index_call("index search", self.index.search(&query, width)).await?;
        if candidates.is_empty() { return Err(Error::NoRelevantContext); }
        debug!(candidates = candidates.len(), width, "retrieved candidates");

        if let RerankerState::Ready(reranker) = &self.reranker {
            match reranker.rerank(search, &candidates, rerank.alpha, rerank.final_top_k) {
                Ok(hits) => {
                    let info = RerankInfo {
                        reranking_used: true,
                        fallback_reason: None,
                        original_retrieval_count: candidates.len(),
                        final_count: hits.len(),
                        cross_encoder_scores: hits.iter().map(|h| h.cross_encoder_score).collect(),
                        original_scores: hits.iter().map(|h| h.original_score).collect(),
                        combined_scores: hits.iter().map(|h| h.combined_score).collect(),
                    };
                    return Ok(Retrieval {
                        search: search.to_string(),
                        scores: info.combined_scores.clone(),
                        context: hits.into_iter().map(|h| h.text).collect(),
                        rerank_info: info,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "re-ranking failed, using similarity order");
                    return Ok(similarity_order(search, candidates, rerank.final_top_k, format!("reranking failed: {e}")));
                }
            }
        }
        let reason = self.reranker.fallback_reason().unwrap_or_default();
        Ok(similarity_order(search, candidates, top_k, reason))
    }

    /// Answer one turn: retrieve context for the mode's search string and
    /// generate with the matching prompt strategy.
    #[instrument(skip_all)]
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let (search, strategy) = match &request.mode {
            QueryMode::Text { question } => (non_empty(question, "question")?.to_string(), PromptStrategy::QuestionAnswer),
            QueryMode::Image { species } => (description_search(non_empty(species, "species")?), PromptStrategy::SpeciesDescription),
            QueryMode::ImageQuestion { species, question } => (
                species_question_search(non_empty(species, "species")?, non_empty(question, "question")?),
                PromptStrategy::SpeciesQuestion,
            ),
        };
        let retrieval = self.retrieve(&search, request.top_k).await?;
        let prompt = strategy.render(&PromptInput {
            context: &retrieval.context,
            history: &request.history,
            summary: request.summary.as_deref(),
            question: &search,
        });
        let answer = self.generator.generate(&prompt).await?;
        info!(context = retrieval.context.len(), reranked = retrieval.rerank_info.reranking_used, "query answered");
        Ok(QueryResponse {
            answer,
            context: retrieval.context,
            scores: retrieval.scores,
            rerank_info: retrieval.rerank_info,
        })
    }

    pub async fn stats(&self) -> Result<PipelineStats> {
        let rerank = &self.settings.rerank;
        Ok(PipelineStats {
            indexed: self.is_indexed(),
            index: self.index_call("index stats", self.index.stats()).await?,
            embedding_model: self.embedder.model_id().to_string(),
            reranking: RerankStatus {
                enabled: rerank.enabled,
                model_id: rerank.model_id.clone(),
                rerank_top_k: rerank.rerank_top_k,
                final_top_k: rerank.final_top_k,
                alpha: rerank.alpha,
                loaded: self.reranking_active(),
                unavailable_reason: match &self.reranker {
                    RerankerState::Unavailable(reason) => Some(reason.clone()),
                    _ => None,
                },
            },
        })
    }

    /// Exercise every component once and report which ones work.
    pub async fn self_test(&self) -> ComponentReport {
        let embedder = match self.embedder.embed_one("Test text") {
            Ok(v) => v.len() == self.settings.embedding.dimension,
            Err(e) => { warn!(error = %e, "embedder self-test failed"); false }
        };
        let chunker = self
            .chunker
            .chunk("one two three four five", "self-test")
            .map(|chunks| !chunks.is_empty())
            .unwrap_or(false);
        let index = match self.index_call("index stats", self.index.stats()).await {
            Ok(stats) => stats.dimension == self.settings.embedding.dimension,
            Err(e) => { warn!(error = %e, "index self-test failed"); false }
        };
        let generator = match self.generator.generate("Hello, how are you?").await {
            Ok(text) => !text.trim().is_empty(),
            Err(e) => { warn!(error = %e, "generator self-test failed"); false }
        };
        let report = ComponentReport { embedder, chunker, index, generator };
        info!(?report, "component self-test");
        report
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { return Err(Error::InvalidInput(format!("{what} must not be empty"))); }
    Ok(trimmed)
}

fn similarity_order(search: &str, mut candidates: Vec<SearchHit>, keep: usize, reason: String) -> Retrieval {
    let original_retrieval_count = candidates.len();
    candidates.truncate(keep);
    let scores: Vec<f32> = candidates.iter().map(|c| c.score).collect();
    Retrieval {
        search: search.to_string(),
        rerank_info: RerankInfo {
            reranking_used: false,
            fallback_reason: Some(reason),
            original_retrieval_count,
            final_count: candidates.len(),
            original_scores: scores.clone(),
            ..Default::default()
        },
        scores,
        context: candidates.into_iter().map(|c| c.text).collect(),
    }
}
