//! libSQL backend: async `ChatStore` implementation.
//!
//! Supports local file and in-memory databases. Chats are stored as one JSON
//! document per row alongside the columns needed for listing.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::chat::{Chat, ChatMetadata};
use crate::store::migrations;
use crate::store::traits::ChatStore;

/// libSQL chat store.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlChatStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlChatStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_metadata(row: &libsql::Row) -> Result<ChatMetadata, libsql::Error> {
    let id: String = row.get(0)?;
    let title: String = row.get(1)?;
    let created_at: String = row.get(2)?;
    let updated_at: String = row.get(3)?;
    Ok(ChatMetadata {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
        title,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

#[async_trait]
impl ChatStore for LibSqlChatStore {
    async fn save_chat(&self, chat: &Chat) -> Result<(), DatabaseError> {
        let data = serde_json::to_string(chat)
            .map_err(|e| DatabaseError::Serialization(format!("save_chat: {e}")))?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO chats (id, title, data_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     data_json = excluded.data_json,
                     updated_at = excluded.updated_at",
                params![chat.id.to_string(), chat.default_title(), data, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_chat: {e}")))?;

        debug!(chat_id = %chat.id, turns = chat.turns.len(), "Chat saved");
        Ok(())
    }

    async fn get_chat(&self, id: Uuid) -> Result<Option<Chat>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT data_json FROM chats WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_chat: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let data: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_chat row parse: {e}")))?;
                let chat = serde_json::from_str(&data)
                    .map_err(|e| DatabaseError::Serialization(format!("get_chat: {e}")))?;
                Ok(Some(chat))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_chat: {e}"))),
        }
    }

    async fn list_chats(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ChatMetadata>, DatabaseError> {
        let offset = i64::from(page.max(1) - 1) * i64::from(page_size);
        let mut rows = self
            .conn()
            .query(
                "SELECT id, title, created_at, updated_at FROM chats
                 ORDER BY updated_at DESC, rowid DESC
                 LIMIT ?1 OFFSET ?2",
                params![i64::from(page_size), offset],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_chats: {e}")))?;

        let mut chats = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            chats.push(
                row_to_metadata(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_chats row parse: {e}")))?,
            );
        }
        Ok(chats)
    }

    async fn total_chats(&self) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM chats", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("total_chats: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).unwrap_or(0);
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("total_chats: {e}"))),
        }
    }

    async fn delete_chat(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute("DELETE FROM chats WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_chat: {e}")))?;

        if affected == 0 {
            warn!(chat_id = %id, "Tried to delete a chat that does not exist");
        }
        Ok(affected > 0)
    }

    async fn rename_chat(&self, id: Uuid, title: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn()
            .execute(
                "UPDATE chats SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("rename_chat: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "chat".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Content;

    fn chat_with(first: &str) -> Chat {
        let mut chat = Chat::new();
        chat.push_exchange(first, Content::from_text("answer"));
        chat
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let store = LibSqlChatStore::new_memory().await.unwrap();
        let chat = chat_with("How do lifetimes work?");
        store.save_chat(&chat).await.unwrap();

        let loaded = store.get_chat(chat.id).await.unwrap().unwrap();
        assert_eq!(loaded, chat);
        assert!(store.get_chat(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_title() {
        let store = LibSqlChatStore::new_memory().await.unwrap();
        let mut chat = chat_with("first question");
        store.save_chat(&chat).await.unwrap();
        store.rename_chat(chat.id, "Renamed").await.unwrap();

        chat.push_exchange("second question", Content::from_text("more"));
        store.save_chat(&chat).await.unwrap();

        let listed = store.list_chats(1, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Renamed");
        assert_eq!(store.get_chat(chat.id).await.unwrap().unwrap().turns.len(), 4);
    }

    #[tokio::test]
    async fn test_list_is_paginated_newest_first() {
        let store = LibSqlChatStore::new_memory().await.unwrap();
        let mut ids = Vec::new();
        for i in 0..5 {
            let chat = chat_with(&format!("chat {i}"));
            store.save_chat(&chat).await.unwrap();
            ids.push(chat.id);
        }

        assert_eq!(store.total_chats().await.unwrap(), 5);

        let page1 = store.list_chats(1, 2).await.unwrap();
        let page3 = store.list_chats(3, 2).await.unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0].id, ids[4]);
        assert_eq!(page1[0].title, "chat 4");
        assert_eq!(page3.len(), 1);
        assert_eq!(page3[0].id, ids[0]);
        // Page 0 is treated as the first page
        assert_eq!(store.list_chats(0, 2).await.unwrap(), page1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = LibSqlChatStore::new_memory().await.unwrap();
        let chat = chat_with("bye");
        store.save_chat(&chat).await.unwrap();

        assert!(store.delete_chat(chat.id).await.unwrap());
        assert!(!store.delete_chat(chat.id).await.unwrap());
        assert_eq!(store.total_chats().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rename_missing_chat() {
        let store = LibSqlChatStore::new_memory().await.unwrap();
        let err = store.rename_chat(Uuid::new_v4(), "x").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_local_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chats.db");
        let chat = chat_with("persisted");

        {
            let store = LibSqlChatStore::new_local(&path).await.unwrap();
            store.save_chat(&chat).await.unwrap();
        }

        let store = LibSqlChatStore::new_local(&path).await.unwrap();
        assert_eq!(store.get_chat(chat.id).await.unwrap().unwrap(), chat);
    }
}
