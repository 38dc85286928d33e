//! codemind: a conversational business-analyst agent.
//!
//! A user asks questions in a chat session. In the agent mode the model may
//! call tools (support-ticket search, sales figures) over several iterations
//! before answering; retrieval modes stream an answer grounded in a fixed
//! document set. Sessions are persisted through a pluggable store.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use codemind::prelude::*;
//!
//! # async fn example() -> codemind::error::Result<()> {
//! let config = CodemindConfig::load()?;
//! let orchestrator = Orchestrator::builder()
//!     .gateway(Arc::new(config.gateway()?))
//!     .store(config.session_store()?)
//!     .tools(default_registry())
//!     .build();
//! let result = orchestrator
//!     .run_turn(TurnRequest::new(Session::new(AppMode::BusinessAgent), "How did EMEA do in Q3?"))
//!     .await;
//! if let Some(answer) = result.session.last_answer() {
//!     println!("{}", answer.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod prelude;
pub mod store;
pub mod tools;
pub mod types;
pub mod workspace;

#[cfg(feature = "cli")]
pub mod cli;
