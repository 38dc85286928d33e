//! The tool seam: a declaration the model sees plus an async handler.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use super::arguments::ToolArguments;
use super::types::ToolParameters;
use crate::error::Result;
use crate::gateway::ToolDefinition;

/// A function the model may call during an agent turn.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and argument schema offered to the model.
    fn definition(&self) -> &ToolDefinition;

    async fn call(&self, args: ToolArguments) -> Result<Value>;

    fn name(&self) -> &str {
        &self.definition().name
    }
}

type Handler = dyn Fn(ToolArguments) -> BoxFuture<'static, Result<Value>> + Send + Sync;

/// [`Tool`] backed by a closure.
#[derive(Clone)]
pub struct AgentTool {
    definition: ToolDefinition,
    handler: Arc<Handler>,
}

impl AgentTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: description.into(),
                parameters: parameters.schema,
            },
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn call(&self, args: ToolArguments) -> Result<Value> {
        (self.handler)(args).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AgentTool").field(&self.definition.name).finish()
    }
}
