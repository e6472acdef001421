//! Research agent: a bounded, tool-augmented conversation and the service
//! that turns its outcome into an answer.

mod conversation;
mod decision;
mod research;
mod termination;
mod transcript;

#[cfg(test)]
pub(crate) mod testing;

pub use conversation::{
    ConversationConfig, ConversationError, ConversationLoop, ConversationOutcome, LoopState,
    TerminationReason,
};
pub use decision::{decide, Decision};
pub use research::{
    ResearchConfig, ResearchError, ResearchOutcome, ResearchRequest, ResearchService, GUIDANCE,
    NO_ANSWER,
};
pub use termination::TerminationPolicy;
pub use transcript::{Message, Role, ToolCall, ToolResult, Transcript};
