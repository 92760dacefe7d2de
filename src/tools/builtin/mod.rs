//! Built-in tools for web search and general engineering questions.

pub mod expert;
pub mod web_search;

pub use expert::{SOFTWARE_EXPERT_TOOL, SoftwareExpertTool};
pub use web_search::{WEB_SEARCH_TOOL, WebSearchTool};
