//! Submission types for the interactive loop.
//!
//! Every line the user types becomes a [`Submission`]: either a message that
//! starts a turn or a slash command that manages chats and listings.

use uuid::Uuid;

/// Parses user input into Submission types.
pub struct SubmissionParser;

impl SubmissionParser {
    /// Parse a line into a Submission.
    pub fn parse(content: &str) -> Submission {
        let trimmed = content.trim();
        let lower = trimmed.to_lowercase();

        match lower.as_str() {
            "/agents" => Submission::Agents,
            "/tools" => Submission::Tools,
            "/new" | "/clear" => Submission::NewChat,
            "/help" | "/?" => Submission::Help,
            "/quit" | "/exit" => Submission::Quit,
            _ => parse_complex(content, trimmed, &lower),
        }
    }
}

/// Parameterized commands (/chats, /open, /rename, /delete), falling back to
/// user input.
fn parse_complex(content: &str, trimmed: &str, lower: &str) -> Submission {
    parse_list(lower)
        .or_else(|| parse_open(lower))
        .or_else(|| parse_rename(trimmed, lower))
        .or_else(|| parse_delete(lower))
        .unwrap_or_else(|| Submission::UserInput {
            content: content.to_string(),
        })
}

/// `/chats [page]`
fn parse_list(lower: &str) -> Option<Submission> {
    let mut parts = lower.split_whitespace();
    if parts.next()? != "/chats" {
        return None;
    }
    let page = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 1,
    };
    Some(Submission::ListChats { page })
}

/// `/open <uuid>`
fn parse_open(lower: &str) -> Option<Submission> {
    let rest = lower.strip_prefix("/open ")?.trim();
    let chat_id = Uuid::parse_str(rest).ok()?;
    Some(Submission::OpenChat { chat_id })
}

/// `/rename <title>` renames the current chat; the title keeps its case.
fn parse_rename(trimmed: &str, lower: &str) -> Option<Submission> {
    lower.strip_prefix("/rename ")?;
    let title = trimmed["/rename ".len()..].trim();
    if title.is_empty() {
        return None;
    }
    Some(Submission::RenameChat {
        title: title.to_string(),
    })
}

/// `/delete <uuid>`
fn parse_delete(lower: &str) -> Option<Submission> {
    let rest = lower.strip_prefix("/delete ")?.trim();
    let chat_id = Uuid::parse_str(rest).ok()?;
    Some(Submission::DeleteChat { chat_id })
}

/// A line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Text for the agent (starts a new turn).
    UserInput { content: String },

    /// List agents that can be mentioned.
    Agents,

    /// List registered tools.
    Tools,

    /// Start an empty chat.
    NewChat,

    /// List stored chats, newest first. `page` is 1-based.
    ListChats { page: u32 },

    /// Continue a stored chat.
    OpenChat { chat_id: Uuid },

    /// Rename the current chat.
    RenameChat { title: String },

    /// Delete a stored chat.
    DeleteChat { chat_id: Uuid },

    Help,

    Quit,
}

impl Submission {
    pub fn user_input(content: impl Into<String>) -> Self {
        Self::UserInput {
            content: content.into(),
        }
    }

    /// Check if this submission starts a new turn.
    pub fn starts_turn(&self) -> bool {
        matches!(self, Self::UserInput { .. })
    }
}

pub const HELP_TEXT: &str = "\
Type a message to talk to the default agent, or start with @agent-name.

Commands:
  /agents            list agents
  /tools             list tools
  /new               start a new chat
  /chats [page]      list saved chats
  /open <id>         continue a saved chat
  /rename <title>    rename the current chat
  /delete <id>       delete a saved chat
  /help              show this help
  /quit              exit

Press Ctrl+C while an answer streams to cancel it.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_user_input() {
        let submission = SubmissionParser::parse("@search what's new in Rust?");
        assert_eq!(
            submission,
            Submission::user_input("@search what's new in Rust?")
        );
        assert!(submission.starts_turn());
    }

    #[test]
    fn test_parser_simple_commands() {
        assert_eq!(SubmissionParser::parse("/agents"), Submission::Agents);
        assert_eq!(SubmissionParser::parse("  /TOOLS "), Submission::Tools);
        assert_eq!(SubmissionParser::parse("/new"), Submission::NewChat);
        assert_eq!(SubmissionParser::parse("/clear"), Submission::NewChat);
        assert_eq!(SubmissionParser::parse("/?"), Submission::Help);
        assert_eq!(SubmissionParser::parse("/exit"), Submission::Quit);
        assert!(!Submission::Quit.starts_turn());
    }

    #[test]
    fn test_parser_list_chats() {
        assert_eq!(
            SubmissionParser::parse("/chats"),
            Submission::ListChats { page: 1 }
        );
        assert_eq!(
            SubmissionParser::parse("/chats 3"),
            Submission::ListChats { page: 3 }
        );
        assert!(SubmissionParser::parse("/chats many").starts_turn());
    }

    #[test]
    fn test_parser_open_and_delete() {
        let id = Uuid::new_v4();
        assert_eq!(
            SubmissionParser::parse(&format!("/open {id}")),
            Submission::OpenChat { chat_id: id }
        );
        assert_eq!(
            SubmissionParser::parse(&format!("/delete {}", id.to_string().to_uppercase())),
            Submission::DeleteChat { chat_id: id }
        );
        assert!(SubmissionParser::parse("/open not-a-uuid").starts_turn());
    }

    #[test]
    fn test_parser_rename_keeps_case() {
        assert_eq!(
            SubmissionParser::parse("/Rename  Borrow Checker Notes "),
            Submission::RenameChat {
                title: "Borrow Checker Notes".to_string()
            }
        );
        assert!(SubmissionParser::parse("/rename ").starts_turn());
    }
}
