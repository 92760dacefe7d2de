//! Persistence layer: libSQL-backed storage for chat history.

pub mod chat;
pub mod libsql_backend;
mod migrations;
pub mod traits;

pub use chat::{Chat, ChatMetadata, ChatTurn, Message, MessageRole};
pub use libsql_backend::LibSqlChatStore;
pub use traits::ChatStore;
