mod support;

use std::sync::Arc;

use serpent_core::config::MemorySettings;
use serpent_core::error::ErrorKind;
use serpent_core::types::{MessageMetadata, Role};
use serpent_memory::{ConversationMemory, InMemoryConversationStore};
use serpent_rag::{ChatRequest, ChatService};

use support::*;

async fn chat(classifier: bool) -> (ChatService, Arc<RecordingGenerator>) {
    let generator = RecordingGenerator::new();
    let rag = Arc::new(service(FixedIndex::new(cobra_pool()), lexical(), generator.clone()));
    rag.load_existing_index().await.unwrap();
    let memory = Arc::new(ConversationMemory::new(
        Arc::new(InMemoryConversationStore::new()),
        rag.generator(),
        MemorySettings::default(),
    ));
    let classifier = classifier.then(|| Arc::new(FixedClassifier("Naja naja")) as Arc<dyn serpent_core::traits::SpeciesClassifier>);
    (ChatService::new(rag, memory, classifier), generator)
}

fn ask(owner: &str, id: Option<uuid::Uuid>, text: &str) -> ChatRequest {
    ChatRequest { owner_id: owner.into(), conversation_id: id, message: Some(text.into()), image: None }
}

#[tokio::test]
async fn first_text_turn_creates_a_conversation() {
    let (chat, _) = chat(false).await;
    let reply = chat.send_message(ask("alice", None, "Is cobra venomous?")).await.unwrap();
    assert_eq!(reply.context_used, 5);
    assert!(reply.reranking_used);
    assert!(!reply.has_summary);
    assert_eq!(reply.history_used, 1, "window includes the new question");

    let conversation = chat.memory().get(reply.conversation_id).await.unwrap();
    assert_eq!(conversation.title, "New Chat");
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[1].role, Role::Ai);
    assert_eq!(
        conversation.messages[1].metadata,
        MessageMetadata::Answer { context_chunks_used: 5, reranking_used: true }
    );
}

#[tokio::test]
async fn image_only_turn_records_detection() {
    let (chat, generator) = chat(true).await;
    let request = ChatRequest { owner_id: "bob".into(), image: Some(vec![0xFF, 0xD8]), ..Default::default() };
    let reply = chat.send_message(request).await.unwrap();
    assert_eq!(reply.detection.as_ref().map(|d| d.predicted_class.as_str()), Some("Naja naja"));

    let conversation = chat.memory().get(reply.conversation_id).await.unwrap();
    assert_eq!(conversation.title, "Chat about Naja naja");
    assert_eq!(conversation.messages[0].content, "[Uploaded image of Naja naja]");
    assert!(matches!(conversation.messages[0].metadata, MessageMetadata::Detection { ref species, .. } if species == "Naja naja"));
    assert!(generator.last_prompt().contains("Describe the snake species Naja naja"));
}

#[tokio::test]
async fn image_with_question_uses_species_question_prompt() {
    let (chat, generator) = chat(true).await;
    let request = ChatRequest {
        owner_id: "bob".into(),
        message: Some("What does it eat?".into()),
        image: Some(vec![1, 2, 3]),
        ..Default::default()
    };
    chat.send_message(request).await.unwrap();
    assert!(generator.last_prompt().contains("User question: What does it eat?"));
}

#[tokio::test]
async fn turn_needs_text_or_image() {
    let (chat, _) = chat(true).await;
    let request = ChatRequest { owner_id: "carol".into(), message: Some("  ".into()), ..Default::default() };
    assert_eq!(chat.send_message(request).await.unwrap_err().kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn image_without_classifier_is_model_unavailable() {
    let (chat, _) = chat(false).await;
    let request = ChatRequest { owner_id: "dan".into(), image: Some(vec![1]), ..Default::default() };
    assert_eq!(chat.send_message(request).await.unwrap_err().kind(), ErrorKind::ModelUnavailable);
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let (chat, _) = chat(false).await;
    let err = chat.send_message(ask("erin", Some(uuid::Uuid::new_v4()), "hello")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn summary_is_written_at_four_messages_and_used_afterwards() {
    let (chat, generator) = chat(false).await;
    let first = chat.send_message(ask("fay", None, "Is cobra venomous?")).await.unwrap();
    assert!(!first.was_summarized);
    let id = first.conversation_id;

    let second = chat.send_message(ask("fay", Some(id), "Where does it live?")).await.unwrap();
    assert!(second.was_summarized, "fourth message triggers the summary");
    assert_eq!(chat.summary(id).await.unwrap().as_deref(), Some("summary"));

    let third = chat.send_message(ask("fay", Some(id), "How big does it get?")).await.unwrap();
    assert!(third.has_summary);
    assert!(!third.was_summarized);
    assert_eq!(third.history_used, 3);
    assert!(generator.last_prompt().contains("Conversation Summary:\nsummary"));
    assert_eq!(generator.prompts.lock().unwrap().len() - generator.answer_prompts().len(), 1, "one summary call");
}

#[tokio::test]
async fn history_listing_delete_and_regenerate() {
    let (chat, _) = chat(false).await;
    let a = chat.send_message(ask("gus", None, "Is cobra venomous?")).await.unwrap().conversation_id;
    let b = chat.send_message(ask("gus", None, "Is cobra venomous?")).await.unwrap().conversation_id;

    let history = chat.history(a, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::Human);

    assert_eq!(chat.regenerate_summary(a).await.unwrap_err().kind(), ErrorKind::InvalidInput);
    chat.send_message(ask("gus", Some(a), "Where does it live?")).await.unwrap();
    chat.send_message(ask("gus", Some(a), "What does it eat?")).await.unwrap();
    assert_eq!(chat.regenerate_summary(a).await.unwrap(), "summary");

    chat.delete(b).await.unwrap();
    let listed = chat.list("gus", 20).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, a);
    assert_eq!(listed[0].message_count, 6);
    assert_eq!(chat.send_message(ask("gus", Some(b), "again")).await.unwrap_err().kind(), ErrorKind::NotFound);
}
