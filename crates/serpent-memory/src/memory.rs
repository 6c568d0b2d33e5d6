use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use serpent_core::config::MemorySettings;
use serpent_core::traits::Generator;
use serpent_core::types::{Conversation, ConversationId, ConversationOverview, ConversationState, Message};
use serpent_core::{Error, Result};

use crate::store::ConversationStore;

/// Result of [`ConversationMemory::add_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub message_count: usize,
    /// A summary was written as part of this append.
    pub summarized: bool,
}

/// Per-conversation message log with a recent window and a generated summary.
///
/// Appends and summary writes for one conversation are serialised, so two
/// concurrent appends can never both trigger a summary.
pub struct ConversationMemory {
    store: Arc<dyn ConversationStore>,
    summarizer: Arc<dyn Generator>,
    settings: MemorySettings,
    locks: Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl ConversationMemory {
    pub fn new(store: Arc<dyn ConversationStore>, summarizer: Arc<dyn Generator>, settings: MemorySettings) -> Self {
        Self { store, summarizer, settings, locks: Mutex::new(HashMap::new()) }
    }

    pub fn settings(&self) -> &MemorySettings { &self.settings }

    async fn lock_for(&self, id: ConversationId) -> Arc<Mutex<()>> {
        self.locks.lock().await.entry(id).or_default().clone()
    }

    /// Drop the caller's handle and forget the lock once no other task holds one.
    async fn release_lock(&self, id: ConversationId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        drop(lock);
        if locks.get(&id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&id);
        }
    }

    /// Conversations with an append or summary in flight.
    pub async fn locked_conversations(&self) -> usize { self.locks.lock().await.len() }

    pub async fn create(&self, owner_id: &str, title: &str) -> Result<ConversationId> {
        let id = self.store.create(Conversation::new(owner_id, title)).await?;
        info!(%id, owner_id, "conversation started");
        Ok(id)
    }

    pub async fn get(&self, id: ConversationId) -> Result<Conversation> { self.store.get(id).await }

    pub async fn state(&self, id: Option<ConversationId>) -> Result<ConversationState> {
        match id {
            None => Ok(ConversationState::New),
            Some(id) => Ok(self.store.get(id).await?.state()),
        }
    }

    /// Append `message`, then write a summary if one is due.
    ///
    /// A failed summary is logged and retried on the next append; the message
    /// itself stays recorded.
    #[instrument(skip(self, message), fields(role = ?message.role))]
    pub async fn add_message(&self, id: ConversationId, message: Message) -> Result<AppendOutcome> {
        let lock = self.lock_for(id).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.append_locked(id, message).await
        };
        self.release_lock(id, lock).await;
        outcome
    }

    async fn append_locked(&self, id: ConversationId, message: Message) -> Result<AppendOutcome> {
        let message_count = self.store.append_message(id, message).await?;
        let conversation = self.store.get(id).await?;
        if !self.summary_due(&conversation) {
            return Ok(AppendOutcome { message_count, summarized: false });
        }
        match self.write_summary(id, &conversation.messages).await {
            Ok(()) => Ok(AppendOutcome { message_count, summarized: true }),
            Err(e) => {
                warn!(%id, error = %e, "summary generation failed, will retry on next message");
                Ok(AppendOutcome { message_count, summarized: false })
            }
        }
    }

    fn summary_due(&self, conversation: &Conversation) -> bool {
        let count = conversation.messages.len();
        match (&conversation.summary, conversation.summarized_at, self.settings.resummarize_every) {
            (None, _, _) => count >= self.settings.summary_threshold,
            (Some(_), Some(at), Some(every)) => count >= at + every,
            (Some(_), _, _) => false,
        }
    }

    async fn write_summary(&self, id: ConversationId, messages: &[Message]) -> Result<()> {
        let summary = self.summarizer.summarize(messages).await?;
        self.store.set_summary(id, summary, messages.len()).await?;
        info!(%id, messages = messages.len(), "conversation summarized");
        Ok(())
    }

    /// Replace the summary unconditionally. Needs at least
    /// `regenerate_min_messages` messages.
    pub async fn regenerate_summary(&self, id: ConversationId) -> Result<String> {
        let lock = self.lock_for(id).await;
        let summary = {
            let _guard = lock.lock().await;
            self.regenerate_locked(id).await
        };
        self.release_lock(id, lock).await;
        summary
    }

    async fn regenerate_locked(&self, id: ConversationId) -> Result<String> {
        let messages = self.store.all_messages(id).await?;
        if messages.len() < self.settings.regenerate_min_messages {
            return Err(Error::InvalidInput(format!(
                "not enough messages to summarize: {} of {} required",
                messages.len(),
                self.settings.regenerate_min_messages
            )));
        }
        self.write_summary(id, &messages).await?;
        self.store.summary(id).await?.ok_or_else(|| Error::Persistence(format!("summary for {id} was not stored")))
    }

    pub async fn recent_messages(&self, id: ConversationId, limit: usize) -> Result<Vec<Message>> {
        self.store.recent_messages(id, limit).await
    }

    /// Tail of the configured `recent_window` size.
    pub async fn recent_window(&self, id: ConversationId) -> Result<Vec<Message>> {
        self.store.recent_messages(id, self.settings.recent_window).await
    }

    pub async fn summary(&self, id: ConversationId) -> Result<Option<String>> { self.store.summary(id).await }

    pub async fn message_count(&self, id: ConversationId) -> Result<usize> { self.store.message_count(id).await }

    pub async fn list(&self, owner_id: &str, limit: usize) -> Result<Vec<ConversationOverview>> {
        self.store.list_for_owner(owner_id, limit).await
    }

    pub async fn delete(&self, id: ConversationId) -> Result<()> {
        self.store.soft_delete(id).await?;
        info!(%id, "conversation deleted");
        Ok(())
    }
}
