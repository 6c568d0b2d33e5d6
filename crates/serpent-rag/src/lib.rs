//! Retrieval orchestration: query construction, candidate retrieval,
//! re-ranking, prompt assembly and the chat turn flow on top of it.

mod chat;
mod generation;
mod ollama;
pub mod prompt;
mod service;

pub use chat::{ChatReply, ChatRequest, ChatService};
pub use generation::ResilientGenerator;
pub use ollama::OllamaGenerator;
pub use prompt::{PromptInput, PromptStrategy};
pub use service::{
    ComponentReport, IngestStats, PipelineStats, QueryMode, QueryRequest, QueryResponse, RagService, RerankInfo,
    RerankStatus, RerankerState, Retrieval,
};
