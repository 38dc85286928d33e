//! Turn event stream types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AppMode, Session, ToolCall};

use super::types::{TurnId, TurnOutcome};

/// Callback receiving turn events as they happen.
pub type TurnEventSink = Arc<dyn Fn(TurnEvent) + Send + Sync>;

/// Concrete event payloads emitted during a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEventPayload {
    TurnStarted {
        session_id: String,
        mode: AppMode,
    },
    IterationStarted {
        iteration: usize,
    },
    ToolPlanRecorded {
        calls: Vec<ToolCall>,
    },
    ToolExecutionStart {
        tool_call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },
    ToolExecutionEnd {
        tool_call_id: String,
        tool_name: String,
        result: serde_json::Value,
        is_error: bool,
    },
    AssistantDelta {
        text: String,
    },
    /// The session as just persisted. Front-ends re-render from this.
    Committed {
        session: Session,
    },
    TurnFinished {
        outcome: TurnOutcome,
    },
}

/// Envelope for turn events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEvent {
    pub turn_id: TurnId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: TurnEventPayload,
}

pub(crate) struct TurnEventEmitter {
    turn_id: TurnId,
    seq: AtomicU64,
    sink: Option<TurnEventSink>,
}

impl TurnEventEmitter {
    pub(crate) fn new(turn_id: TurnId, sink: Option<TurnEventSink>) -> Self {
        Self {
            turn_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(crate) fn emit(&self, payload: TurnEventPayload) {
        let Some(sink) = &self.sink else { return };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(TurnEvent {
            turn_id: self.turn_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}
