//! Tool abstraction for agent capabilities.

pub mod builtin;
pub mod registry;
pub mod router;
pub mod tool;

pub use registry::ToolRegistry;
pub use tool::*;
