//! Turnloop: agents that stream model output into an append-only turn buffer.

pub mod agent;
pub mod config;
pub mod content;
pub mod error;
pub mod llm;
pub mod store;
pub mod tools;
