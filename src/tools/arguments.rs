//! Typed access to tool call arguments.

use crate::error::CodemindError;

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Build from the argument map carried by a [`crate::types::ToolCall`].
    pub fn from_map(args: &serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            value: serde_json::Value::Object(args.clone()),
        }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, CodemindError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| CodemindError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument. Blank strings count as absent.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}
