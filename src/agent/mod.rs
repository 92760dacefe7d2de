//! Agents, the per-turn context they stream through, and the turn runtime.

pub mod builtin;
pub mod context;
pub mod prompts;
pub mod registry;
pub mod step;
pub mod submission;
pub mod turn;

pub use context::{AgentChunk, AgentContext, MAX_TOKENS_MESSAGE, Observation, StreamOptions};
pub use registry::{Agent, AgentRegistry};
pub use step::{Step, StepKind, ToolCallStep};
pub use submission::{Submission, SubmissionParser};
pub use turn::{Turn, TurnOutcome, TurnRequest, TurnRunner};
