//! The turn loop.

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use chrono::Utc;
use futures::future::join_all;
use futures::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dataset;
use crate::error::{CodemindError, Result};
use crate::gateway::{CompletionRequest, ModelGateway};
use crate::store::SessionStore;
use crate::tools::ToolRegistry;
use crate::types::{as_retrieval_results, Message, RetrievalResult, Session, ToolCall, ToolResponse};

use super::events::{TurnEventEmitter, TurnEventPayload, TurnEventSink};
use super::types::{
    ExhaustionPolicy, TurnId, TurnOutcome, TurnResult, DEFAULT_MAX_ITERATIONS, EXHAUSTION_NOTICE,
};

/// Input for one turn: the session (by value), the user's query, and an optional image.
#[derive(Clone)]
pub struct TurnRequest {
    pub turn_id: TurnId,
    pub session: Session,
    pub query: String,
    /// Inline image as a `data:` URL.
    pub image: Option<String>,
    pub event_sink: Option<TurnEventSink>,
}

impl TurnRequest {
    pub fn new(session: Session, query: impl Into<String>) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            session,
            query: query.into(),
            image: None,
            event_sink: None,
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn with_event_sink(mut self, sink: TurnEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }
}

/// Runs turns against a gateway, a tool registry, and a session store.
///
/// ```no_run
/// use std::sync::Arc;
/// use codemind::gateway::GeminiGateway;
/// use codemind::orchestrator::{Orchestrator, TurnRequest};
/// use codemind::store::MemorySessionStore;
/// use codemind::tools::default_registry;
/// use codemind::types::{AppMode, Session};
///
/// # async fn example() {
/// let orchestrator = Orchestrator::builder()
///     .gateway(Arc::new(GeminiGateway::new("key", "gemini-2.5-flash")))
///     .store(Arc::new(MemorySessionStore::new()))
///     .tools(default_registry())
///     .build();
/// let result = orchestrator
///     .run_turn(TurnRequest::new(Session::new(AppMode::BusinessAgent), "Q3 sales in EMEA?"))
///     .await;
/// println!("{:?}", result.session.last_answer());
/// # }
/// ```
#[derive(Builder)]
pub struct Orchestrator {
    gateway: Arc<dyn ModelGateway>,
    store: Arc<dyn SessionStore>,
    #[builder(default)]
    tools: ToolRegistry,
    #[builder(default = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,
    #[builder(default)]
    exhaustion: ExhaustionPolicy,
    /// Per-call limit for tool execution. Unlimited when unset.
    tool_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one agentic turn.
    ///
    /// Never fails: gateway and tool errors end the turn with an error message
    /// appended to the session and [`TurnOutcome::Failed`].
    pub async fn run_turn(&self, request: TurnRequest) -> TurnResult {
        let TurnRequest {
            turn_id,
            mut session,
            query,
            image,
            event_sink,
        } = request;
        let emitter = TurnEventEmitter::new(turn_id, event_sink);
        info!(%turn_id, session_id = %session.id, mode = %session.mode, "turn started");
        emitter.emit(TurnEventPayload::TurnStarted {
            session_id: session.id.clone(),
            mode: session.mode,
        });

        session.push_user(&query, image);
        self.commit(&session, &emitter).await;

        let mut gateway_calls = 0;
        let outcome = match self.drive(&mut session, &emitter, &mut gateway_calls).await {
            Ok(outcome) => outcome,
            Err(err) => self.fail(&mut session, &emitter, err).await,
        };

        self.finish(turn_id, session, outcome, gateway_calls, &emitter)
    }

    /// Run one streaming turn for a retrieval mode.
    ///
    /// Documents matching the query are sent as context and attached to the
    /// reply as its sources. The reply grows fragment by fragment.
    pub async fn stream_turn(&self, request: TurnRequest) -> TurnResult {
        let TurnRequest {
            turn_id,
            mut session,
            query,
            image,
            event_sink,
        } = request;
        let emitter = TurnEventEmitter::new(turn_id, event_sink);
        info!(%turn_id, session_id = %session.id, mode = %session.mode, "streaming turn started");
        emitter.emit(TurnEventPayload::TurnStarted {
            session_id: session.id.clone(),
            mode: session.mode,
        });

        session.push_user(&query, image);
        self.commit(&session, &emitter).await;

        let sources =
            dataset::search_documents(&query, session.mode, session.custom_dataset.as_deref());
        debug!(sources = sources.len(), "retrieved context");

        let outcome = match self.pump(&mut session, &query, sources, &emitter).await {
            Ok(outcome) => outcome,
            Err(err) => self.fail(&mut session, &emitter, err).await,
        };

        self.finish(turn_id, session, outcome, 1, &emitter)
    }

    async fn drive(
        &self,
        session: &mut Session,
        emitter: &TurnEventEmitter,
        gateway_calls: &mut usize,
    ) -> Result<TurnOutcome> {
        let definitions = self.tools.definitions();
        let mut sources: Vec<RetrievalResult> = Vec::new();

        for iteration in 1..=self.max_iterations {
            emitter.emit(TurnEventPayload::IterationStarted { iteration });
            let request = CompletionRequest::new(session.model_history(), session.mode)
                .with_tools(definitions.clone());

            *gateway_calls += 1;
            let completion = self.gateway.request_completion(&request).await?;
            debug!(
                iteration,
                tool_calls = completion.tool_calls.len(),
                has_text = completion.text.is_some(),
                "gateway responded"
            );

            if !completion.tool_calls.is_empty() {
                let calls = completion.tool_calls;
                let placeholder = Message::placeholder(calls.clone());
                let placeholder_id = placeholder.id.clone();
                session.messages.push(placeholder);
                emitter.emit(TurnEventPayload::ToolPlanRecorded {
                    calls: calls.clone(),
                });
                self.commit(session, emitter).await;

                let responses = self.execute_tools(&calls, emitter).await?;
                sources = responses
                    .iter()
                    .filter_map(|r| as_retrieval_results(&r.response))
                    .flatten()
                    .collect();

                session.remove_message(&placeholder_id);
                session.messages.push(Message::tool_request(calls));
                session.messages.push(Message::tool_results(responses));
                continue;
            }

            session.clear_placeholders();
            let (message, outcome) = match completion.text.filter(|t| !t.trim().is_empty()) {
                Some(text) => (Message::model(text, sources), TurnOutcome::Answered),
                None => (Message::fallback(), TurnOutcome::Fallback),
            };
            session.messages.push(message);
            self.commit(session, emitter).await;
            return Ok(outcome);
        }

        warn!(
            session_id = %session.id,
            max_iterations = self.max_iterations,
            "turn stopped at the iteration cap without a final answer"
        );
        session.clear_placeholders();
        if self.exhaustion == ExhaustionPolicy::Notify {
            session.messages.push(Message::model(EXHAUSTION_NOTICE, Vec::new()));
        }
        self.commit(session, emitter).await;
        Ok(TurnOutcome::Exhausted)
    }

    /// Dispatch one iteration's calls concurrently. Results keep call order.
    async fn execute_tools(
        &self,
        calls: &[ToolCall],
        emitter: &TurnEventEmitter,
    ) -> Result<Vec<ToolResponse>> {
        let pending = calls.iter().map(|call| async move {
            info!(tool = %call.name, tool_call_id = %call.id, "dispatching tool call");
            emitter.emit(TurnEventPayload::ToolExecutionStart {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                args: serde_json::Value::Object(call.args.clone()),
            });

            let result = match self.tool_timeout {
                Some(limit) => tokio::time::timeout(limit, self.tools.respond(call))
                    .await
                    .unwrap_or_else(|_| {
                        Err(CodemindError::tool(
                            &call.name,
                            format!("timed out after {}ms", limit.as_millis()),
                        ))
                    }),
                None => self.tools.respond(call).await,
            };

            let (payload, is_error) = match &result {
                Ok(response) => (response.response.clone(), false),
                Err(err) => (serde_json::json!({ "error": err.to_string() }), true),
            };
            emitter.emit(TurnEventPayload::ToolExecutionEnd {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                result: payload,
                is_error,
            });
            result
        });

        join_all(pending).await.into_iter().collect()
    }

    async fn pump(
        &self,
        session: &mut Session,
        query: &str,
        sources: Vec<RetrievalResult>,
        emitter: &TurnEventEmitter,
    ) -> Result<TurnOutcome> {
        let mut history = session.model_history();
        if !sources.is_empty() {
            if let Some(last) = history.last_mut() {
                last.content = with_context(query, &sources);
            }
        }
        let request = CompletionRequest::new(history, session.mode);
        let mut fragments = self.gateway.stream_completion(&request).await?;

        session.messages.push(Message::model(String::new(), sources));
        let reply_idx = session.messages.len() - 1;

        while let Some(fragment) = fragments.next().await {
            let fragment = match fragment {
                Ok(text) => text,
                Err(err) => {
                    if session.messages[reply_idx].content.is_empty() {
                        session.messages.remove(reply_idx);
                    }
                    return Err(err);
                }
            };
            session.messages[reply_idx].content.push_str(&fragment);
            emitter.emit(TurnEventPayload::AssistantDelta { text: fragment });
        }

        let outcome = if session.messages[reply_idx].content.trim().is_empty() {
            session.messages[reply_idx] = Message::fallback();
            TurnOutcome::Fallback
        } else {
            TurnOutcome::Answered
        };
        self.commit(session, emitter).await;
        Ok(outcome)
    }

    async fn fail(
        &self,
        session: &mut Session,
        emitter: &TurnEventEmitter,
        err: CodemindError,
    ) -> TurnOutcome {
        warn!(session_id = %session.id, error = %err, category = ?err.category(), "turn failed");
        session.clear_placeholders();
        session.messages.push(Message::error(err.to_string()));
        self.commit(session, emitter).await;
        TurnOutcome::Failed {
            error: err.to_string(),
        }
    }

    /// Persist and publish. Store failures are logged, never propagated.
    async fn commit(&self, session: &Session, emitter: &TurnEventEmitter) {
        if let Err(err) = self.store.save(session).await {
            warn!(session_id = %session.id, error = %err, "failed to persist session");
        }
        emitter.emit(TurnEventPayload::Committed {
            session: session.clone(),
        });
    }

    fn finish(
        &self,
        turn_id: TurnId,
        session: Session,
        outcome: TurnOutcome,
        gateway_calls: usize,
        emitter: &TurnEventEmitter,
    ) -> TurnResult {
        info!(%turn_id, ?outcome, gateway_calls, "turn finished");
        emitter.emit(TurnEventPayload::TurnFinished {
            outcome: outcome.clone(),
        });
        TurnResult {
            turn_id,
            session,
            outcome,
            gateway_calls,
            finished_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tools", &self.tools)
            .field("max_iterations", &self.max_iterations)
            .field("exhaustion", &self.exhaustion)
            .field("tool_timeout", &self.tool_timeout)
            .finish_non_exhaustive()
    }
}

/// The user's query prefixed with the retrieved documents.
fn with_context(query: &str, sources: &[RetrievalResult]) -> String {
    let mut prompt = String::from("Context:\n");
    for (i, doc) in sources.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {} ({})\n{}\n\n",
            i + 1,
            doc.source.file_name,
            doc.source.path,
            doc.content_snippet.trim()
        ));
    }
    prompt.push_str("Question: ");
    prompt.push_str(query);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    #[test]
    fn context_lists_documents_before_the_question() {
        let docs = vec![RetrievalResult::new(
            Source::new("Login Issue APAC", "Ticket #55198"),
            " login issues in Japan ",
            0.95,
        )];
        let prompt = with_context("login?", &docs);
        assert_eq!(
            prompt,
            "Context:\n[1] Login Issue APAC (Ticket #55198)\nlogin issues in Japan\n\nQuestion: login?"
        );
    }
}
