//! Convenience re-exports for common use.

pub use crate::config::CodemindConfig;
pub use crate::error::{CodemindError, Result};
pub use crate::gateway::{Completion, CompletionRequest, ModelGateway};
pub use crate::orchestrator::{
    ExhaustionPolicy, Orchestrator, TurnEvent, TurnEventPayload, TurnOutcome, TurnRequest,
    TurnResult,
};
pub use crate::store::SessionStore;
pub use crate::tools::{default_registry, AgentTool, Tool, ToolArguments, ToolRegistry};
pub use crate::types::{AppMode, Message, RetrievalResult, Role, Session, Source, ToolCall};
pub use crate::workspace::Workspace;
