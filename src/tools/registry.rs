//! Name → handler lookup table for tool dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use super::arguments::ToolArguments;
use super::tool::Tool;
use crate::error::CodemindError;
use crate::gateway::ToolDefinition;
use crate::types::{ToolCall, ToolResponse};

/// Payload returned for a name no tool is registered under.
pub fn tool_not_found(name: &str) -> serde_json::Value {
    serde_json::json!({ "error": format!("Tool {name} not found.") })
}

/// Registered tools, looked up by name. Declaration order follows registration.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Declarations offered to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition().clone())
            .collect()
    }

    /// Run the tool registered under `name`.
    ///
    /// An unknown name is not an error: it resolves to a `{ "error": ... }`
    /// payload so the turn can carry on. Errors raised by the tool itself are
    /// returned as [`CodemindError::ToolExecution`].
    pub async fn dispatch(
        &self,
        name: &str,
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, CodemindError> {
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!(tool = name, "model requested an unknown tool");
            return Ok(tool_not_found(name));
        };
        tool.call(ToolArguments::from_map(args))
            .await
            .map_err(|err| match err {
                err @ CodemindError::ToolExecution { .. } => err,
                other => CodemindError::tool(name, other.to_string()),
            })
    }

    /// Dispatch a model call and correlate the result to its id.
    pub async fn respond(&self, call: &ToolCall) -> Result<ToolResponse, CodemindError> {
        let response = self.dispatch(&call.name, &call.args).await?;
        Ok(ToolResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response,
        })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AgentTool, ToolParameters};

    fn echo_tool(name: &'static str) -> Arc<dyn Tool> {
        Arc::new(AgentTool::new(
            name,
            "echo",
            ToolParameters::empty(),
            |args| async move { Ok(args.raw().clone()) },
        ))
    }

    #[tokio::test]
    async fn unknown_tool_resolves_to_error_payload() {
        let registry = ToolRegistry::new();
        let result = registry
            .dispatch("doesNotExist", &serde_json::Map::new())
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({ "error": "Tool doesNotExist not found." }));
    }

    #[tokio::test]
    async fn respond_keeps_call_id() {
        let registry = ToolRegistry::new().with_tool(echo_tool("echo"));
        let mut args = serde_json::Map::new();
        args.insert("q".into(), "x".into());
        let call = ToolCall::new("call-7", "echo", args);
        let response = registry.respond(&call).await.unwrap();
        assert_eq!(response.id, "call-7");
        assert_eq!(response.response["q"], "x");
    }

    #[test]
    fn definitions_follow_registration_order() {
        let registry = ToolRegistry::new()
            .with_tool(echo_tool("b"))
            .with_tool(echo_tool("a"))
            .with_tool(echo_tool("b"));
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn tool_failures_surface_as_tool_execution_errors() {
        let registry = ToolRegistry::new().with_tool(Arc::new(AgentTool::new(
            "broken",
            "always fails",
            ToolParameters::empty(),
            |args| async move {
                args.get_str("missing")?;
                Ok(serde_json::Value::Null)
            },
        )));
        let err = registry
            .dispatch("broken", &serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CodemindError::ToolExecution { ref tool_name, .. } if tool_name == "broken"));
    }
}
