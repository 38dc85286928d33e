//! Core turn types for the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::types::Session;

/// Unique turn identifier.
pub type TurnId = Uuid;

/// Gateway calls allowed per turn unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Appended under [`ExhaustionPolicy::Notify`] when the iteration cap is hit.
pub const EXHAUSTION_NOTICE: &str =
    "I couldn't complete this request within the allowed number of steps. Please try rephrasing or narrowing your question.";

/// What happens when a turn runs out of iterations while the model still asks for tools.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Stop with the tool exchange as the last visible messages.
    #[default]
    Silent,
    /// Also append a model message saying the request could not be completed.
    Notify,
}

/// How a turn ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Answered,
    Fallback,
    Exhausted,
    Failed { error: String },
}

impl TurnOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of a turn: the updated session plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub turn_id: TurnId,
    pub session: Session,
    pub outcome: TurnOutcome,
    /// Model calls made during the turn.
    pub gateway_calls: usize,
    pub finished_at: DateTime<Utc>,
}
