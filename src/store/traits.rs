//! `ChatStore` trait: async interface for chat persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::chat::{Chat, ChatMetadata};

/// Backend-agnostic chat storage.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Insert or update a chat. New chats are titled from their first message;
    /// an existing title is kept.
    async fn save_chat(&self, chat: &Chat) -> Result<(), DatabaseError>;

    /// Get a chat by ID.
    async fn get_chat(&self, id: Uuid) -> Result<Option<Chat>, DatabaseError>;

    /// List chats, most recently updated first. `page` is 1-based.
    async fn list_chats(&self, page: u32, page_size: u32)
    -> Result<Vec<ChatMetadata>, DatabaseError>;

    /// Total number of stored chats.
    async fn total_chats(&self) -> Result<u64, DatabaseError>;

    /// Delete a chat. Returns whether anything was deleted.
    async fn delete_chat(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Set a chat's title.
    async fn rename_chat(&self, id: Uuid, title: &str) -> Result<(), DatabaseError>;
}
