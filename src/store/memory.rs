use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SessionStore;
use crate::error::Result;
use crate::types::Session;

/// Process-local store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn load_all(&self) -> Result<HashMap<String, Session>> {
        Ok(self.sessions.read().await.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppMode;

    #[tokio::test]
    async fn save_replaces_by_id() {
        let store = MemorySessionStore::new();
        let mut session = Session::new(AppMode::BusinessAgent);
        store.save(&session).await.unwrap();
        session.push_user("hello", None);
        store.save(&session).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[&session.id].messages.len(), 1);
    }
}
