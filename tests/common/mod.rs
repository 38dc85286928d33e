//! Shared test helpers: a scripted gateway and a store that always fails.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;

use codemind::error::{CodemindError, Result};
use codemind::gateway::{Completion, CompletionRequest, ModelGateway};
use codemind::orchestrator::{TurnEvent, TurnEventSink};
use codemind::store::SessionStore;
use codemind::types::{Session, ToolCall};

enum Step {
    Reply(Completion),
    Fail(CodemindError),
}

/// A gateway that answers from a queue and records every request it sees.
///
/// When the queue runs dry it keeps returning the `repeat` completion, or a
/// plain "Mock response" text when none is set.
#[derive(Default)]
pub struct ScriptedGateway {
    steps: Mutex<Vec<Step>>,
    repeat: Mutex<Option<Completion>>,
    fragments: Mutex<Vec<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_text(self, text: &str) -> Self {
        self.push(Step::Reply(Completion::text(text)))
    }

    pub fn then_calls(self, calls: Vec<ToolCall>) -> Self {
        self.push(Step::Reply(Completion::tool_calls(calls)))
    }

    pub fn then_empty(self) -> Self {
        self.push(Step::Reply(Completion::default()))
    }

    pub fn then_error(self, err: CodemindError) -> Self {
        self.push(Step::Fail(err))
    }

    /// Answer every request past the queue with `completion`.
    pub fn always(self, completion: Completion) -> Self {
        *self.repeat.lock().unwrap() = Some(completion);
        self
    }

    /// Fragments yielded by the next streaming call.
    pub fn streaming(self, fragments: Vec<Result<String>>) -> Self {
        *self.fragments.lock().unwrap() = fragments;
        self
    }

    fn push(self, step: Step) -> Self {
        self.steps.lock().unwrap().push(step);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn request_completion(&self, request: &CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request.clone());
        let mut steps = self.steps.lock().unwrap();
        if steps.is_empty() {
            let repeat = self.repeat.lock().unwrap().clone();
            return Ok(repeat.unwrap_or_else(|| Completion::text("Mock response")));
        }
        match steps.remove(0) {
            Step::Reply(completion) => Ok(completion),
            Step::Fail(err) => Err(err),
        }
    }

    async fn stream_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<String>>> {
        self.requests.lock().unwrap().push(request.clone());
        {
            let mut steps = self.steps.lock().unwrap();
            if matches!(steps.first(), Some(Step::Fail(_))) {
                if let Step::Fail(err) = steps.remove(0) {
                    return Err(err);
                }
            }
        }
        let fragments = std::mem::take(&mut *self.fragments.lock().unwrap());
        Ok(Box::pin(futures::stream::iter(fragments)))
    }
}

/// A store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn initialize(&self) -> Result<()> {
        Err(CodemindError::Store("offline".into()))
    }

    async fn save(&self, _session: &Session) -> Result<()> {
        Err(CodemindError::Store("offline".into()))
    }

    async fn load(&self, _id: &str) -> Result<Option<Session>> {
        Err(CodemindError::Store("offline".into()))
    }

    async fn load_all(&self) -> Result<HashMap<String, Session>> {
        Err(CodemindError::Store("offline".into()))
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Err(CodemindError::Store("offline".into()))
    }
}

/// An event sink that collects everything it is handed.
pub fn recording_sink() -> (TurnEventSink, Arc<Mutex<Vec<TurnEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&events);
    let sink: TurnEventSink = Arc::new(move |event| captured.lock().unwrap().push(event));
    (sink, events)
}

/// A tool call with JSON object arguments.
pub fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    let args = match args {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    ToolCall::new(id, name, args)
}
