//! Conversation log, recent-window reads and the summary lifecycle.

mod memory;
mod store;

pub use memory::{AppendOutcome, ConversationMemory};
pub use store::{ConversationStore, InMemoryConversationStore};
