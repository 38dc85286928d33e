use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::SessionStore;
use crate::error::Result;
use crate::types::Session;

/// One pretty-printed JSON file per session under `base_dir`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    base_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", normalize_id(id)))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        fs::create_dir_all(&self.base_dir).await?;
        let serialized = serde_json::to_vec_pretty(session)?;
        fs::write(self.session_path(&session.id), serialized).await?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Session>> {
        let raw = match fs::read(self.session_path(id)).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn load_all(&self) -> Result<HashMap<String, Session>> {
        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(err.into()),
        };

        let mut sessions = HashMap::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read(&path).await?;
            match serde_json::from_slice::<Session>(&raw) {
                Ok(session) => {
                    sessions.insert(session.id.clone(), session);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable session file");
                }
            }
        }
        Ok(sessions)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match fs::remove_file(self.session_path(id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Keep ids usable as file names.
fn normalize_id(id: &str) -> String {
    let out: String = id
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect();
    if out.trim_matches('-').is_empty() {
        "session".to_string()
    } else {
        out
    }
}
