//! Session persistence boundary and its backends.
//!
//! "Not found" is never an error: `load` answers `None` and `load_all` an
//! empty map. Errors are reserved for a backend that cannot be reached or
//! returns something unreadable.

pub mod elastic;
pub mod file;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Session;

pub use elastic::{ElasticConfig, ElasticSessionStore, DEFAULT_INDEX};
pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

/// Storage abstraction for persisted sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Prepare the backend (create directories, indexes). Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Insert or replace a session by id.
    async fn save(&self, session: &Session) -> Result<()>;

    async fn load(&self, id: &str) -> Result<Option<Session>>;

    async fn load_all(&self) -> Result<HashMap<String, Session>>;

    /// Remove a session. Deleting an unknown id succeeds.
    async fn delete(&self, id: &str) -> Result<()>;
}
