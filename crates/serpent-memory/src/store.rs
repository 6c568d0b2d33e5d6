use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use serpent_core::types::{Conversation, ConversationId, ConversationOverview, Message};
use serpent_core::{Error, Result};

/// Document store for conversations. Every mutating call is atomic: it either
/// fully applies (including `updated_at`) or fails without effect.
///
/// Soft-deleted conversations stay readable through [`ConversationStore::get`]
/// but reject every other call with `NotFound`.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create(&self, conversation: Conversation) -> Result<ConversationId>;
    async fn get(&self, id: ConversationId) -> Result<Conversation>;
    /// Append one message and return the new message count.
    async fn append_message(&self, id: ConversationId, message: Message) -> Result<usize>;
    /// Last `limit` messages, oldest first.
    async fn recent_messages(&self, id: ConversationId, limit: usize) -> Result<Vec<Message>>;
    async fn all_messages(&self, id: ConversationId) -> Result<Vec<Message>>;
    /// Store `summary`, recording the message count it covers.
    async fn set_summary(&self, id: ConversationId, summary: String, message_count: usize) -> Result<()>;
    async fn summary(&self, id: ConversationId) -> Result<Option<String>>;
    async fn message_count(&self, id: ConversationId) -> Result<usize>;
    /// Active conversations of `owner_id`, most recently updated first.
    async fn list_for_owner(&self, owner_id: &str, limit: usize) -> Result<Vec<ConversationOverview>>;
    async fn soft_delete(&self, id: ConversationId) -> Result<()>;
}

/// Process-local store.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self { Self::default() }
}

fn not_found(id: ConversationId) -> Error {
    Error::NotFound(format!("conversation {id}"))
}

fn active(map: &HashMap<ConversationId, Conversation>, id: ConversationId) -> Result<&Conversation> {
    map.get(&id).filter(|c| c.active).ok_or_else(|| not_found(id))
}

fn active_mut(map: &mut HashMap<ConversationId, Conversation>, id: ConversationId) -> Result<&mut Conversation> {
    map.get_mut(&id).filter(|c| c.active).ok_or_else(|| not_found(id))
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    #[instrument(skip_all, fields(owner = %conversation.owner_id))]
    async fn create(&self, conversation: Conversation) -> Result<ConversationId> {
        let mut map = self.conversations.write().await;
        if map.contains_key(&conversation.id) {
            return Err(Error::Persistence(format!("conversation {} already exists", conversation.id)));
        }
        let id = conversation.id;
        map.insert(id, conversation);
        debug!(%id, "conversation created");
        Ok(id)
    }

    async fn get(&self, id: ConversationId) -> Result<Conversation> {
        self.conversations.read().await.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn append_message(&self, id: ConversationId, message: Message) -> Result<usize> {
        let mut map = self.conversations.write().await;
        let conversation = active_mut(&mut map, id)?;
        conversation.updated_at = message.timestamp.max(conversation.updated_at);
        conversation.messages.push(message);
        Ok(conversation.messages.len())
    }

    async fn recent_messages(&self, id: ConversationId, limit: usize) -> Result<Vec<Message>> {
        let map = self.conversations.read().await;
        Ok(active(&map, id)?.tail(limit).to_vec())
    }

    async fn all_messages(&self, id: ConversationId) -> Result<Vec<Message>> {
        let map = self.conversations.read().await;
        Ok(active(&map, id)?.messages.clone())
    }

    async fn set_summary(&self, id: ConversationId, summary: String, message_count: usize) -> Result<()> {
        let mut map = self.conversations.write().await;
        let conversation = active_mut(&mut map, id)?;
        conversation.summary = Some(summary);
        conversation.summarized_at = Some(message_count);
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn summary(&self, id: ConversationId) -> Result<Option<String>> {
        let map = self.conversations.read().await;
        Ok(active(&map, id)?.summary.clone())
    }

    async fn message_count(&self, id: ConversationId) -> Result<usize> {
        let map = self.conversations.read().await;
        Ok(active(&map, id)?.messages.len())
    }

    async fn list_for_owner(&self, owner_id: &str, limit: usize) -> Result<Vec<ConversationOverview>> {
        let map = self.conversations.read().await;
        let mut listed: Vec<ConversationOverview> = map
            .values()
            .filter(|c| c.active && c.owner_id == owner_id)
            .map(Conversation::overview)
            .collect();
        listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        listed.truncate(limit);
        Ok(listed)
    }

    async fn soft_delete(&self, id: ConversationId) -> Result<()> {
        let mut map = self.conversations.write().await;
        let conversation = active_mut(&mut map, id)?;
        conversation.active = false;
        conversation.updated_at = Utc::now();
        debug!(%id, "conversation soft-deleted");
        Ok(())
    }
}
