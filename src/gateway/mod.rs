//! Model gateway: the boundary to the language model.
//!
//! A gateway takes the conversation history plus the session mode and answers
//! with either free text or a list of requested tool calls. Streaming
//! completion yields plain text fragments.

pub mod gemini;
pub mod http;
pub mod speech;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{AppMode, Message, ToolCall};

pub use gemini::GeminiGateway;
pub use speech::{GeminiSpeech, SpeechSynthesizer};

/// A tool declaration offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema object for the arguments.
    pub parameters: serde_json::Value,
}

/// Everything the gateway needs for one model call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub history: Vec<Message>,
    pub mode: AppMode,
    pub tools: Vec<ToolDefinition>,
}

impl CompletionRequest {
    /// Placeholders are stripped from `history`.
    pub fn new(history: Vec<Message>, mode: AppMode) -> Self {
        Self {
            history: history.into_iter().filter(|m| !m.is_placeholder()).collect(),
            mode,
            tools: Vec::new(),
        }
    }

    /// Attach tool declarations. Ignored for modes that do not offer tools.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        if self.mode.offers_tools() {
            self.tools = tools;
        }
        self
    }

    pub fn system_instruction(&self) -> &'static str {
        system_instruction(self.mode)
    }
}

/// The model's answer to a non-streaming request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            text: None,
            tool_calls: calls,
        }
    }

    /// Neither tool calls nor non-blank text.
    pub fn is_degenerate(&self) -> bool {
        self.tool_calls.is_empty() && self.text.as_deref().map_or(true, |t| t.trim().is_empty())
    }
}

/// Language model boundary used by the orchestrator.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// One non-streaming model call. Failures are returned, never retried.
    async fn request_completion(&self, request: &CompletionRequest) -> Result<Completion>;

    /// A lazy, finite stream of text fragments in produced order.
    async fn stream_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<String>>>;
}

const BUSINESS_AGENT_INSTRUCTION: &str = "You are an expert AI Business Analyst. Your goal is to help users understand complex business data by synthesizing information from multiple sources.
- When a user asks a question, first formulate a plan.
- Then, use the available tools to fetch the necessary data from different sources (like support tickets, sales data, documents).
- If you need to call multiple tools, you can do so.
- Once you have the data, analyze it and provide a comprehensive, synthesized answer to the user's original question.
- If the tools provide the answer, synthesize it and respond directly. Do not say you used a tool unless it's relevant to the answer.
- Format numerical data in Markdown tables for clarity.";

const RESEARCH_INSTRUCTION: &str = "You are a world-class research assistant. Your task is to answer the user's question based *only* on the context provided below, which contains abstracts from scientific papers.
- Analyze the provided abstracts carefully.
- Synthesize information to provide a clear, concise, and accurate answer.
- If the context is insufficient, state that clearly.
- Do not use knowledge outside of the provided context.";

const SUPPORT_INSTRUCTION: &str = "You are a highly-skilled customer support specialist. Your task is to resolve the user's issue based *only* on the context provided, which contains similar past support tickets.
- Analyze the provided tickets to identify the problem and solution.
- Formulate a helpful and empathetic response to the user.
- If no relevant tickets are found, suggest escalating the issue.
- Do not use knowledge outside of the provided context.";

const GOOGLE_DRIVE_INSTRUCTION: &str = "You are a helpful assistant for Google Drive. Your task is to answer the user's question based *only* on the context provided below from their Google Docs, Sheets, and Slides.
- Analyze the provided document snippets carefully.
- Provide a clear, concise, and accurate answer based exclusively on the given text.
- If the answer is found in a spreadsheet, format your response as a Markdown table.";

const CUSTOM_INSTRUCTION: &str = "You are a helpful and intelligent assistant. Your task is to answer the user's question based *only* on the context provided below, which contains content from user-uploaded documents.
- Analyze the provided document snippets carefully.
- Provide a clear, concise, and accurate answer based exclusively on the given text.
- Format your response in Markdown, including tables and headers if appropriate.";

const CODEBASE_INSTRUCTION: &str = "You are an expert software engineer and senior tech lead. Your task is to answer the user's question based *only* on the context provided below, which contains snippets from a codebase.
- Analyze the provided code snippets carefully.
- Provide a clear, concise, and accurate answer.
- If the context is insufficient to answer, state that clearly.
- Your answer must be based *exclusively* on the text provided. Do not use any external knowledge.
- Format code blocks appropriately in Markdown.";

/// Fixed system instruction for a mode. Modes without their own persona use
/// the codebase one.
pub fn system_instruction(mode: AppMode) -> &'static str {
    match mode {
        AppMode::BusinessAgent => BUSINESS_AGENT_INSTRUCTION,
        AppMode::Research => RESEARCH_INSTRUCTION,
        AppMode::Support => SUPPORT_INSTRUCTION,
        AppMode::GoogleDrive => GOOGLE_DRIVE_INSTRUCTION,
        AppMode::Custom => CUSTOM_INSTRUCTION,
        AppMode::Codebase | AppMode::WebSearch => CODEBASE_INSTRUCTION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "getSalesData".into(),
            description: "sales".into(),
            parameters: serde_json::json!({ "type": "object" }),
        }
    }

    #[test]
    fn tools_are_only_attached_in_agent_mode() {
        let agent = CompletionRequest::new(vec![], AppMode::BusinessAgent).with_tools(vec![definition()]);
        assert_eq!(agent.tools.len(), 1);
        let support = CompletionRequest::new(vec![], AppMode::Support).with_tools(vec![definition()]);
        assert!(support.tools.is_empty());
    }

    #[test]
    fn placeholders_never_reach_the_model() {
        let history = vec![Message::user("hi", None), Message::placeholder(vec![])];
        let request = CompletionRequest::new(history, AppMode::BusinessAgent);
        assert_eq!(request.history.len(), 1);
    }

    #[test]
    fn blank_text_without_calls_is_degenerate() {
        assert!(Completion::default().is_degenerate());
        assert!(Completion::text("  \n").is_degenerate());
        assert!(!Completion::text("ok").is_degenerate());
        let call = ToolCall::new("c", "getSalesData", serde_json::Map::new());
        assert!(!Completion::tool_calls(vec![call]).is_degenerate());
    }

    #[test]
    fn web_search_shares_the_codebase_persona() {
        assert_eq!(system_instruction(AppMode::WebSearch), system_instruction(AppMode::Codebase));
        assert!(system_instruction(AppMode::BusinessAgent).starts_with("You are an expert AI Business Analyst"));
    }
}
