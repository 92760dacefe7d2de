//! Chat history model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::Content;
use crate::llm::ChatMessage;

/// Maximum title length derived from the first message.
pub const TITLE_MAX_CHARS: usize = 100;

pub const UNTITLED_CHAT: &str = "Untitled chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A stored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: Content,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::User,
            content: Content::from_text(text),
        }
    }

    pub fn assistant(content: Content) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content,
        }
    }
}

/// One position in the conversation. Regenerated answers are kept as
/// alternatives; `current_index` picks the one shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub messages: Vec<Message>,
    pub current_index: usize,
}

impl ChatTurn {
    pub fn new(message: Message) -> Self {
        Self {
            messages: vec![message],
            current_index: 0,
        }
    }

    pub fn current(&self) -> Option<&Message> {
        self.messages.get(self.current_index)
    }

    /// Add an alternative and make it current.
    pub fn add_alternative(&mut self, message: Message) {
        self.messages.push(message);
        self.current_index = self.messages.len() - 1;
    }
}

/// A conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub turns: Vec<ChatTurn>,
}

impl Chat {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.turns.push(ChatTurn::new(message));
    }

    /// Append a user input and the assistant's answer.
    pub fn push_exchange(&mut self, input: impl Into<String>, answer: Content) {
        self.push(Message::user(input));
        self.push(Message::assistant(answer));
    }

    /// Current messages as model history, skipping empty answers.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .filter_map(ChatTurn::current)
            .filter_map(|m| {
                let text = m.content.text();
                if text.is_empty() {
                    return None;
                }
                Some(match m.role {
                    MessageRole::User => ChatMessage::user(text),
                    MessageRole::Assistant => ChatMessage::assistant(text),
                })
            })
            .collect()
    }

    /// Title derived from the first message.
    pub fn default_title(&self) -> String {
        let first = self
            .turns
            .first()
            .and_then(ChatTurn::current)
            .map(|m| m.content.text())
            .unwrap_or_default();
        let first = first.trim();
        if first.is_empty() {
            return UNTITLED_CHAT.to_string();
        }
        first.chars().take(TITLE_MAX_CHARS).collect()
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}

/// Listing entry for a stored chat.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMetadata {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn test_history_uses_current_alternative() {
        let mut chat = Chat::new();
        chat.push_exchange("hi", Content::from_text("first answer"));
        chat.turns[1].add_alternative(Message::assistant(Content::from_text("second answer")));
        chat.push_exchange("again", Content::new());

        let history = chat.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, "second answer");
        assert_eq!(history[2].content, "again");
    }

    #[test]
    fn test_default_title_truncates() {
        let mut chat = Chat::new();
        assert_eq!(chat.default_title(), UNTITLED_CHAT);

        chat.push(Message::user("é".repeat(150)));
        assert_eq!(chat.default_title().chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn test_chat_roundtrips_through_json() {
        let mut chat = Chat::new();
        chat.push_exchange("q", Content::from_text("a"));
        let json = serde_json::to_string(&chat).unwrap();
        let back: Chat = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chat);
    }
}
