//! Conversation state model: sessions, messages, tool calls and responses.

pub mod message;
pub mod retrieval;
pub mod session;

pub use message::*;
pub use retrieval::*;
pub use session::*;
