use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use serpent_core::traits::SpeciesClassifier;
use serpent_core::types::{ConversationId, ConversationOverview, Detection, Message, MessageMetadata, Role};
use serpent_core::{Error, Result};
use serpent_memory::ConversationMemory;

use crate::service::{QueryMode, QueryRequest, RagService};

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub owner_id: String,
    pub conversation_id: Option<ConversationId>,
    pub message: Option<String>,
    pub image: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub conversation_id: ConversationId,
    pub message: String,
    pub context_used: usize,
    pub reranking_used: bool,
    pub detection: Option<Detection>,
    /// A summary was written during this turn.
    pub was_summarized: bool,
    pub history_used: usize,
    pub has_summary: bool,
}

/// One user turn end to end: classify, remember, retrieve, answer, remember.
pub struct ChatService {
    rag: Arc<RagService>,
    memory: Arc<ConversationMemory>,
    classifier: Option<Arc<dyn SpeciesClassifier>>,
}

impl ChatService {
    pub fn new(rag: Arc<RagService>, memory: Arc<ConversationMemory>, classifier: Option<Arc<dyn SpeciesClassifier>>) -> Self {
        Self { rag, memory, classifier }
    }

    pub fn memory(&self) -> &ConversationMemory { &self.memory }

    #[instrument(skip_all, fields(owner = %request.owner_id, conversation = ?request.conversation_id))]
    pub async fn send_message(&self, request: ChatRequest) -> Result<ChatReply> {
        let text = request.message.as_deref().map(str::trim).filter(|m| !m.is_empty());
        if text.is_none() && request.image.is_none() {
            return Err(Error::InvalidInput("a message or an image is required".into()));
        }

        let detection = match &request.image {
            Some(bytes) => {
                let classifier = self
                    .classifier
                    .as_ref()
                    .ok_or_else(|| Error::ModelUnavailable("no image classifier configured".into()))?;
                let detection = classifier.detect(bytes).await?;
                info!(species = %detection.predicted_class, probability = detection.probability, "image classified");
                Some(detection)
            }
            None => None,
        };
        let species = detection.as_ref().map(|d| d.predicted_class.clone());

        let conversation_id = match request.conversation_id {
            Some(id) => {
                let conversation = self.memory.get(id).await?;
                if !conversation.active { return Err(Error::NotFound(format!("conversation {id}"))); }
                id
            }
            None => {
                let title = match &species {
                    Some(s) => format!("Chat about {s}"),
                    None => "New Chat".to_string(),
                };
                self.memory.create(&request.owner_id, &title).await?
            }
        };

        let human_content = match (text, &species) {
            (Some(t), _) => t.to_string(),
            (None, Some(s)) => format!("[Uploaded image of {s}]"),
            (None, None) => String::new(),
        };
        let human_metadata = match &detection {
            Some(d) => MessageMetadata::Detection { species: d.predicted_class.clone(), probability: d.probability },
            None => MessageMetadata::None,
        };
        let human = self
            .memory
            .add_message(conversation_id, Message::new(Role::Human, human_content, human_metadata))
            .await?;

        let history = self.memory.recent_window(conversation_id).await?;
        let summary = self.memory.summary(conversation_id).await?;

        let mode = match (species, text) {
            (Some(species), Some(question)) => QueryMode::ImageQuestion { species, question: question.to_string() },
            (Some(species), None) => QueryMode::Image { species },
            (None, Some(question)) => QueryMode::Text { question: question.to_string() },
            (None, None) => return Err(Error::InvalidInput("a message or an image is required".into())),
        };
        let history_used = history.len();
        let has_summary = summary.is_some();
        let response = self
            .rag
            .query(&QueryRequest { mode, history, summary, top_k: None })
            .await?;

        let ai_metadata = MessageMetadata::Answer {
            context_chunks_used: response.context.len(),
            reranking_used: response.rerank_info.reranking_used,
        };
        let ai = self
            .memory
            .add_message(conversation_id, Message::new(Role::Ai, response.answer.clone(), ai_metadata))
            .await?;

        Ok(ChatReply {
            conversation_id,
            message: response.answer,
            context_used: response.context.len(),
            reranking_used: response.rerank_info.reranking_used,
            detection,
            was_summarized: human.summarized || ai.summarized,
            history_used,
            has_summary,
        })
    }

    /// Last `limit` messages of a conversation, oldest first.
    pub async fn history(&self, id: ConversationId, limit: usize) -> Result<Vec<Message>> {
        self.memory.recent_messages(id, limit).await
    }

    pub async fn list(&self, owner_id: &str, limit: usize) -> Result<Vec<ConversationOverview>> {
        self.memory.list(owner_id, limit).await
    }

    pub async fn delete(&self, id: ConversationId) -> Result<()> { self.memory.delete(id).await }

    pub async fn summary(&self, id: ConversationId) -> Result<Option<String>> { self.memory.summary(id).await }

    pub async fn regenerate_summary(&self, id: ConversationId) -> Result<String> {
        self.memory.regenerate_summary(id).await
    }
}
