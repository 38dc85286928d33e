//! Session lifecycle around the orchestrator.
//!
//! A [`Workspace`] owns the in-memory session map and the active session,
//! keeps both in step with the store, and makes sure no two turns run against
//! the same session at once.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::dataset;
use crate::error::{CodemindError, Result};
use crate::orchestrator::{
    Orchestrator, TurnEventPayload, TurnEventSink, TurnRequest, TurnResult,
};
use crate::store::SessionStore;
use crate::types::{AppMode, Session, Source};

/// Characters of the joined file names kept in a custom session's title.
const CUSTOM_TITLE_MAX_CHARS: usize = 40;

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<String, Session>,
    active: Option<String>,
}

pub struct Workspace {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn SessionStore>,
    state: Arc<Mutex<State>>,
    busy: Mutex<HashSet<String>>,
    event_sink: Option<TurnEventSink>,
}

/// Marks a session busy until dropped.
struct BusyGuard<'a> {
    busy: &'a Mutex<HashSet<String>>,
    session_id: String,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }
}

impl Workspace {
    pub fn new(orchestrator: Arc<Orchestrator>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            orchestrator,
            store,
            state: Arc::new(Mutex::new(State::default())),
            busy: Mutex::new(HashSet::new()),
            event_sink: None,
        }
    }

    /// Forward every turn event to `sink` as well.
    pub fn with_event_sink(mut self, sink: TurnEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn persist(&self, session: &Session) {
        if let Err(err) = self.store.save(session).await {
            warn!(session_id = %session.id, error = %err, "failed to persist session");
        }
    }

    /// Adopt stored sessions, or start fresh when there are none.
    ///
    /// Returns the active session.
    pub async fn load_history(&self) -> Session {
        if let Err(err) = self.store.initialize().await {
            warn!(error = %err, "session store initialization failed");
        }

        match self.store.load_all().await {
            Ok(loaded) if !loaded.is_empty() => {
                let first = sorted_by_title(loaded.values()).into_iter().next().cloned();
                info!(sessions = loaded.len(), "loaded chat history");
                let mut state = self.state();
                state.sessions = loaded;
                if let Some(first) = first {
                    state.active = Some(first.id.clone());
                    return first;
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to load chat history"),
        }
        self.create_session(AppMode::default()).await
    }

    /// Create, persist, and activate a fresh session.
    pub async fn create_session(&self, mode: AppMode) -> Session {
        let session = Session::new(mode);
        self.persist(&session).await;
        let mut state = self.state();
        state.sessions.insert(session.id.clone(), session.clone());
        state.active = Some(session.id.clone());
        session
    }

    /// Switch the active session's mode in place while it is empty; otherwise
    /// start a new session in `mode`.
    pub async fn change_mode(&self, mode: AppMode) -> Session {
        let switched = {
            let mut state = self.state();
            let active_id = state.active.clone().unwrap_or_default();
            match state.sessions.get_mut(&active_id) {
                Some(session) if session.is_empty() => {
                    session.switch_mode(mode);
                    Some(session.clone())
                }
                _ => None,
            }
        };
        match switched {
            Some(session) => {
                self.persist(&session).await;
                session
            }
            None => self.create_session(mode).await,
        }
    }

    /// Delete a session. If it was active, another one takes its place.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        if let Err(err) = self.store.delete(id).await {
            warn!(session_id = id, error = %err, "failed to delete stored session");
        }

        let needs_fresh = {
            let mut state = self.state();
            if state.sessions.remove(id).is_none() {
                return Err(CodemindError::SessionNotFound(id.to_string()));
            }
            if state.active.as_deref() == Some(id) {
                let next = sorted_by_title(state.sessions.values())
                    .first()
                    .map(|s| s.id.clone());
                state.active = next;
            }
            state.active.is_none()
        };

        if needs_fresh {
            self.create_session(AppMode::default()).await;
        }
        Ok(())
    }

    pub fn select_session(&self, id: &str) -> Result<Session> {
        let mut state = self.state();
        let session = state
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| CodemindError::SessionNotFound(id.to_string()))?;
        state.active = Some(id.to_string());
        Ok(session)
    }

    pub fn active_session(&self) -> Option<Session> {
        let state = self.state();
        state.active.as_ref().and_then(|id| state.sessions.get(id)).cloned()
    }

    pub fn session(&self, id: &str) -> Option<Session> {
        self.state().sessions.get(id).cloned()
    }

    /// All sessions, ordered by title.
    pub fn sessions(&self) -> Vec<Session> {
        let state = self.state();
        sorted_by_title(state.sessions.values())
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    /// Run an agentic turn on the active session.
    pub async fn send_message(&self, query: &str, image: Option<String>) -> Result<TurnResult> {
        let (session, _guard) = self.begin_turn(query)?;
        let request = self.turn_request(session, query, image);
        let result = self.orchestrator.run_turn(request).await;
        self.adopt(&result.session).await;
        Ok(result)
    }

    /// Run a streaming turn on the active session.
    pub async fn stream_message(&self, query: &str, image: Option<String>) -> Result<TurnResult> {
        let (session, _guard) = self.begin_turn(query)?;
        let request = self.turn_request(session, query, image);
        let result = self.orchestrator.stream_turn(request).await;
        self.adopt(&result.session).await;
        Ok(result)
    }

    fn begin_turn(&self, query: &str) -> Result<(Session, BusyGuard<'_>)> {
        if query.trim().is_empty() {
            return Err(CodemindError::InvalidArgument("message is empty".into()));
        }
        let session = self
            .active_session()
            .ok_or_else(|| CodemindError::SessionNotFound("no active session".into()))?;

        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(session.id.clone()) {
            return Err(CodemindError::Busy(session.id));
        }
        drop(busy);

        let guard = BusyGuard {
            busy: &self.busy,
            session_id: session.id.clone(),
        };
        Ok((session, guard))
    }

    fn turn_request(&self, session: Session, query: &str, image: Option<String>) -> TurnRequest {
        let state = Arc::clone(&self.state);
        let forward = self.event_sink.clone();
        let sink: TurnEventSink = Arc::new(move |event| {
            if let TurnEventPayload::Committed { session } = &event.payload {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                replace_existing(&mut state.sessions, session);
            }
            if let Some(forward) = &forward {
                forward(event);
            }
        });
        TurnRequest::new(session, query)
            .with_image(image)
            .with_event_sink(sink)
    }

    /// Take a finished turn's session back into the map, unless it was
    /// deleted while the turn ran. A deleted session's commits are removed
    /// from the store again.
    async fn adopt(&self, session: &Session) {
        let present = replace_existing(&mut self.state().sessions, session);
        if !present {
            debug!(session_id = %session.id, "session deleted during its turn");
            if let Err(err) = self.store.delete(&session.id).await {
                warn!(session_id = %session.id, error = %err, "failed to delete stored session");
            }
        }
    }

    /// Build a custom dataset from files and open a `Your Documents` session on it.
    pub async fn upload_dataset(&self, paths: &[PathBuf]) -> Result<Session> {
        let session = custom_session(paths).await?;
        self.persist(&session).await;

        let mut state = self.state();
        state.sessions.insert(session.id.clone(), session.clone());
        state.active = Some(session.id.clone());
        Ok(session)
    }

    /// Files browsable in the active session's mode.
    pub fn list_files(&self) -> Vec<Source> {
        self.active_session()
            .map(|s| dataset::list_files(s.mode, s.custom_dataset.as_deref()))
            .unwrap_or_default()
    }

    pub fn file_content(&self, source: &Source) -> Option<String> {
        let session = self.active_session()?;
        dataset::file_content(source, session.mode, session.custom_dataset.as_deref())
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("orchestrator", &self.orchestrator)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Overwrite the stored copy of `session`; returns false when it is gone.
fn replace_existing(sessions: &mut HashMap<String, Session>, session: &Session) -> bool {
    match sessions.get_mut(&session.id) {
        Some(slot) => {
            *slot = session.clone();
            true
        }
        None => false,
    }
}

/// A new `Your Documents` session carrying a dataset read from `paths`.
///
/// Fails when none of the files could be read as text.
pub async fn custom_session(paths: &[PathBuf]) -> Result<Session> {
    let records = dataset::dataset_from_paths(paths).await?;
    if records.is_empty() {
        return Err(CodemindError::InvalidArgument(
            "none of the given files could be read as text".into(),
        ));
    }

    let names: Vec<String> = paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    let joined: String = names.join(", ").chars().take(CUSTOM_TITLE_MAX_CHARS).collect();

    let mut session = Session::new(AppMode::Custom);
    session.title = format!("Custom: {joined}");
    session.custom_dataset = Some(records);
    info!(session_id = %session.id, files = names.len(), "custom dataset loaded");
    Ok(session)
}

fn sorted_by_title<'a>(sessions: impl Iterator<Item = &'a Session>) -> Vec<&'a Session> {
    let mut sorted: Vec<&Session> = sessions.collect();
    sorted.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
    sorted
}
