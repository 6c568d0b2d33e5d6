//! Domain types shared by the chunker, the vector backends, the reranker and
//! conversation memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A bounded span of a source field, the atomic retrieval unit.
///
/// - `text`: the window of units taken from the field
/// - `source_field`: the field name the window was cut from
/// - `position`: zero-based window index within that field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_field: String,
    pub position: usize,
}

impl Chunk {
    /// Passage text as stored in the index: the chunk prefixed with the
    /// species and field it belongs to.
    pub fn contextualized(&self, species: &str) -> String {
        format!("{} - {}: {}", species, self.source_field, self.text)
    }
}

/// A species record as found in the knowledge base.
///
/// Field order is kept stable (`BTreeMap`) so ingestion is reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesDocument {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// One nearest-neighbour result. Higher `score` is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankedHit {
    pub text: String,
    pub cross_encoder_score: f32,
    pub original_score: f32,
    pub combined_score: f32,
}

/// Read-only description of a vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub vector_count: usize,
    pub dimension: usize,
    pub backend: String,
    pub collection: String,
}

/// Output of the external image classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub predicted_class: String,
    pub probability: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
    System,
}

impl Role {
    /// Speaker label used when rendering a transcript for the model.
    pub fn speaker(self) -> &'static str {
        match self {
            Role::Human => "User",
            Role::Ai => "Assistant",
            Role::System => "System",
        }
    }
}

/// Typed per-message metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageMetadata {
    #[default]
    None,
    /// Attached to a human turn that carried an image.
    Detection { species: String, probability: f32 },
    /// Attached to a generated answer.
    Answer { context_chunks_used: usize, reranking_used: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, metadata: MessageMetadata) -> Self {
        Self { role, content: content.into(), timestamp: Utc::now(), metadata }
    }

    pub fn human(content: impl Into<String>) -> Self { Self::new(Role::Human, content, MessageMetadata::None) }

    pub fn ai(content: impl Into<String>) -> Self { Self::new(Role::Ai, content, MessageMetadata::None) }
}

pub type ConversationId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub owner_id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub summary: Option<String>,
    /// Message count at the time the current summary was written.
    #[serde(default)]
    pub summarized_at: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
}

impl Conversation {
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            title: title.into(),
            messages: Vec::new(),
            summary: None,
            summarized_at: None,
            created_at: now,
            updated_at: now,
            active: true,
        }
    }

    pub fn state(&self) -> ConversationState {
        if !self.active {
            ConversationState::Deleted
        } else if self.summary.is_some() {
            ConversationState::Summarized
        } else {
            ConversationState::Active
        }
    }

    /// Tail window of the transcript, oldest first.
    pub fn tail(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    pub fn overview(&self) -> ConversationOverview {
        ConversationOverview {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.messages.len(),
        }
    }
}

/// Lifecycle of a conversation. `New` is the state before any id exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    New,
    Active,
    Summarized,
    Deleted,
}

/// Listing entry; carries no messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationOverview {
    pub id: ConversationId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Render messages as `Speaker: content` lines.
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.speaker(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
