//! Message types for the conversation state model.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::retrieval::RetrievalResult;

/// Text shown when the model returns neither text nor tool calls.
pub const FALLBACK_ANSWER: &str =
    "I was unable to find a specific answer or action. How else can I help?";

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// The result of a tool invocation, correlated to its call by `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResponse {
    pub id: String,
    pub name: String,
    pub response: serde_json::Value,
}

/// A citation from open-domain web search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// A single chat message.
///
/// Exactly one payload dominates a message: `content`, `tool_calls`,
/// `tool_responses`, or the transient `tool_call_plan`. See [`Message::kind`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Inline image as a `data:<mime>;base64,<payload>` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<RetrievalResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_sources: Option<Vec<GroundingSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_responses: Option<Vec<ToolResponse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_plan: Option<Vec<ToolCall>>,
}

/// Which payload a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Transient "thinking" message shown while tools run. Never sent to the model.
    Placeholder,
    ToolRequest,
    ToolResult,
    Text,
}

impl Message {
    fn base(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            image: None,
            sources: None,
            grounding_sources: None,
            tool_calls: None,
            tool_responses: None,
            tool_call_plan: None,
        }
    }

    /// Create a user message, optionally carrying an inline image.
    pub fn user(text: impl Into<String>, image: Option<String>) -> Self {
        Self {
            image,
            ..Self::base(Role::User, text.into())
        }
    }

    /// Create a model text message. Empty source lists are omitted.
    pub fn model(text: impl Into<String>, sources: Vec<RetrievalResult>) -> Self {
        Self {
            sources: (!sources.is_empty()).then_some(sources),
            ..Self::base(Role::Model, text.into())
        }
    }

    /// The fixed answer used when the model produced nothing actionable.
    pub fn fallback() -> Self {
        Self::base(Role::Model, FALLBACK_ANSWER.to_string())
    }

    /// A model-authored message describing a failed turn.
    pub fn error(description: impl AsRef<str>) -> Self {
        Self::base(
            Role::Model,
            format!("Sorry, I encountered an error: {}", description.as_ref()),
        )
    }

    /// The transient plan shown before tool execution completes.
    pub fn placeholder(plan: Vec<ToolCall>) -> Self {
        Self {
            tool_call_plan: Some(plan),
            ..Self::base(Role::Model, String::new())
        }
    }

    /// Synthetic model message recording the calls requested in one iteration.
    pub fn tool_request(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::base(Role::Model, String::new())
        }
    }

    /// Synthetic tool message carrying the correlated results of one iteration.
    pub fn tool_results(responses: Vec<ToolResponse>) -> Self {
        Self {
            tool_responses: Some(responses),
            ..Self::base(Role::Tool, String::new())
        }
    }

    pub fn kind(&self) -> MessageKind {
        if self.tool_call_plan.is_some() {
            MessageKind::Placeholder
        } else if self.tool_calls.is_some() {
            MessageKind::ToolRequest
        } else if self.tool_responses.is_some() {
            MessageKind::ToolResult
        } else {
            MessageKind::Text
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind() == MessageKind::Placeholder
    }
}

/// Split a `data:<mime>;base64,<payload>` URL into `(mime, payload)`.
pub fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, data) = rest.split_once(";base64,")?;
    if mime.is_empty() || data.is_empty() {
        return None;
    }
    Some((mime, data))
}
