//! Persistence of finished conversation turns.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::types::ChatMessage;

/// Errors from a [`TurnStore`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend rejected or failed the write.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Saves a completed user/assistant exchange.
///
/// Only called once the full assistant reply is known, never for partial
/// or failed turns.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Persist one exchange for `conversation_id`.
    async fn save_turn(
        &self,
        conversation_id: &str,
        user: &ChatMessage,
        assistant: &ChatMessage,
    ) -> Result<(), StoreError>;
}

/// In-memory turn store backed by a `HashMap` behind a `RwLock`.
///
/// Suitable for tests and single-process use where history does not need to
/// survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryTurnStore {
    conversations: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryTurnStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All saved messages for a conversation, oldest first.
    pub async fn messages(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TurnStore for InMemoryTurnStore {
    async fn save_turn(
        &self,
        conversation_id: &str,
        user: &ChatMessage,
        assistant: &ChatMessage,
    ) -> Result<(), StoreError> {
        let mut conversations = self.conversations.write().await;
        let history = conversations.entry(conversation_id.to_string()).or_default();
        history.push(user.clone());
        history.push(assistant.clone());
        Ok(())
    }
}
