//! Tool system for function calling.

pub mod arguments;
pub mod builtin;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use builtin::default_registry;
pub use registry::{tool_not_found, ToolRegistry};
pub use tool::{AgentTool, Tool};
pub use types::ToolParameters;
