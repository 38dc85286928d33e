//! Shared HTTP client, SSE parsing, and status mapping.

use std::sync::OnceLock;

use crate::error::CodemindError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to default HTTP client");
                reqwest::Client::new()
            })
    })
}

/// Parse an SSE "data:" line, returning None for "[DONE]" and non-data lines.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Map a non-success HTTP status to a typed error.
pub fn status_to_error(status: u16, body: &str) -> CodemindError {
    let message = error_message(body);
    match status {
        401 | 403 => CodemindError::Authentication(message),
        429 => CodemindError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => CodemindError::api(status, message),
    }
}

/// Pull `error.message` out of a Google-style error body, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

fn extract_retry_after(body: &str) -> Option<u64> {
    // google.rpc.RetryInfo carries the delay as e.g. "12s"
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("details")?
        .as_array()?
        .iter()
        .find_map(|d| d.get("retryDelay").and_then(|r| r.as_str()))
        .and_then(|delay| delay.trim_end_matches('s').parse::<f64>().ok())
        .map(|secs| (secs * 1000.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_data_lines_are_extracted() {
        assert_eq!(parse_sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(parse_sse_data("data:{}"), Some("{}"));
        assert_eq!(parse_sse_data("data: [DONE]"), None);
        assert_eq!(parse_sse_data("event: ping"), None);
    }

    #[test]
    fn statuses_map_to_typed_errors() {
        let body = r#"{"error":{"code":403,"message":"API key not valid"}}"#;
        assert!(matches!(
            status_to_error(403, body),
            CodemindError::Authentication(ref m) if m == "API key not valid"
        ));
        assert!(matches!(
            status_to_error(500, "boom"),
            CodemindError::Api { status: 500, ref message } if message == "boom"
        ));
    }

    #[test]
    fn retry_delay_is_read_from_details() {
        let body = r#"{"error":{"message":"quota","details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"1.5s"}]}}"#;
        assert!(matches!(
            status_to_error(429, body),
            CodemindError::RateLimited { retry_after_ms: Some(1500) }
        ));
    }
}
