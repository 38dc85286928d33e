//! Retrieval records returned by dataset search and the ticket tool.

use serde::{Deserialize, Serialize};

/// Where a retrieved snippet came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub file_name: String,
    pub path: String,
}

impl Source {
    pub fn new(file_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            path: path.into(),
        }
    }
}

/// One ranked retrieval hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub source: Source,
    pub content_snippet: String,
    pub score: f64,
}

impl RetrievalResult {
    pub fn new(source: Source, content_snippet: impl Into<String>, score: f64) -> Self {
        Self {
            source,
            content_snippet: content_snippet.into(),
            score,
        }
    }
}

/// Interpret a tool result as a list of retrieval records.
///
/// Returns `None` when the value is not an array or any element does not have
/// the retrieval record shape.
pub fn as_retrieval_results(value: &serde_json::Value) -> Option<Vec<RetrievalResult>> {
    if !value.is_array() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ticket_arrays_are_recognized() {
        let value = json!([{
            "source": { "fileName": "Login Issue EMEA", "path": "Ticket #48151" },
            "contentSnippet": "cannot log in",
            "score": 0.92
        }]);
        let parsed = as_retrieval_results(&value).unwrap();
        assert_eq!(parsed[0].source.path, "Ticket #48151");
    }

    #[test]
    fn other_shapes_are_not_sources() {
        assert!(as_retrieval_results(&json!([{ "region": "NA", "sales": 1, "date": "Q3" }])).is_none());
        assert!(as_retrieval_results(&json!({ "error": "x" })).is_none());
    }
}
