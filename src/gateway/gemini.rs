//! Google Gemini gateway.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{CodemindError, Result};
use crate::types::{split_data_url, Message, Role, ToolCall};

use super::http::{parse_sse_data, shared_client, status_to_error};
use super::{Completion, CompletionRequest, ModelGateway};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub struct GeminiGateway {
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGateway {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the gateway at another endpoint, e.g. a proxy or a test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let contents: Vec<Value> = request.history.iter().filter_map(content_for).collect();

        let mut body = json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": request.system_instruction() }] },
        });

        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        body
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        let resp = shared_client()
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status >= 400 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }
        Ok(resp)
    }
}

impl std::fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn request_completion(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = self.build_request_body(request);
        debug!(
            model = %self.model,
            mode = %request.mode,
            messages = request.history.len(),
            tools = request.tools.len(),
            "Gemini generateContent"
        );

        let resp = self.post(&self.url("generateContent"), &body).await?;
        let data: GeminiResponse = resp.json().await?;

        let Some(candidate) = data.candidates.into_iter().next() else {
            debug!("Gemini response carried no candidates");
            return Ok(Completion::default());
        };

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(fc) = part.function_call {
                let args = match fc.args {
                    Some(Value::Object(map)) => map,
                    _ => serde_json::Map::new(),
                };
                let id = fc.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                tool_calls.push(ToolCall::new(id, fc.name, args));
            }
        }

        Ok(Completion {
            text: (!text.is_empty()).then_some(text),
            tool_calls,
        })
    }

    async fn stream_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let body = self.build_request_body(request);
        let url = format!("{}?alt=sse", self.url("streamGenerateContent"));
        debug!(model = %self.model, mode = %request.mode, "Gemini streamGenerateContent");

        let resp = self.post(&url, &body).await?;
        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(CodemindError::Network(e));
                        break;
                    }
                };

                // Decode whole lines only; a chunk may end inside a multi-byte character.
                buffer.extend_from_slice(&chunk);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let Ok(line) = std::str::from_utf8(&raw) else {
                        debug!("skipping non-UTF-8 SSE line");
                        continue;
                    };

                    let Some(data) = parse_sse_data(line.trim()) else { continue };
                    match serde_json::from_str::<GeminiResponse>(data) {
                        Ok(resp) => {
                            for fragment in resp.text_fragments() {
                                yield Ok(fragment);
                            }
                        }
                        Err(e) => debug!(error = %e, "skipping undecodable SSE chunk"),
                    }
                }
            }

            let tail = String::from_utf8_lossy(&buffer);
            if let Some(resp) = parse_sse_data(tail.trim()).and_then(|d| serde_json::from_str::<GeminiResponse>(d).ok()) {
                for fragment in resp.text_fragments() {
                    yield Ok(fragment);
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Map one history message to a Gemini `Content`. Messages without parts are dropped.
fn content_for(msg: &Message) -> Option<Value> {
    let mut parts = Vec::new();
    let role = match msg.role {
        Role::User => "user",
        Role::Model => "model",
        Role::Tool => "function",
    };

    if !msg.content.is_empty() {
        parts.push(json!({ "text": msg.content }));
    }
    if let Some((mime, data)) = msg.image.as_deref().and_then(split_data_url) {
        parts.push(json!({ "inlineData": { "mimeType": mime, "data": data } }));
    }
    for call in msg.tool_calls.iter().flatten() {
        parts.push(json!({ "functionCall": { "name": call.name, "args": call.args } }));
    }
    for response in msg.tool_responses.iter().flatten() {
        let payload = match &response.response {
            Value::Object(_) => response.response.clone(),
            other => json!({ "result": other }),
        };
        parts.push(json!({
            "functionResponse": { "name": response.name, "response": payload }
        }));
    }

    (!parts.is_empty()).then(|| json!({ "role": role, "parts": parts }))
}

// Internal Gemini response types

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

impl GeminiResponse {
    fn text_fragments(self) -> Vec<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).filter(|t| !t.is_empty()).collect())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    id: Option<String>,
    name: String,
    args: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ToolDefinition;
    use crate::types::{AppMode, ToolResponse};

    fn gateway() -> GeminiGateway {
        GeminiGateway::new("test-key", DEFAULT_MODEL)
    }

    #[test]
    fn history_maps_roles_and_payloads() {
        let mut args = serde_json::Map::new();
        args.insert("region".into(), "NA".into());
        let history = vec![
            Message::user("sales?", Some("data:image/png;base64,AAAA".into())),
            Message::tool_request(vec![ToolCall::new("c1", "getSalesData", args)]),
            Message::tool_results(vec![ToolResponse {
                id: "c1".into(),
                name: "getSalesData".into(),
                response: json!([{ "region": "NA" }]),
            }]),
        ];
        let body = gateway().build_request_body(&CompletionRequest::new(history, AppMode::BusinessAgent));
        let contents = body["contents"].as_array().unwrap();

        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["args"]["region"], "NA");
        assert_eq!(contents[2]["role"], "function");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["result"][0]["region"],
            "NA"
        );
    }

    #[test]
    fn tools_are_declared_only_when_present() {
        let def = ToolDefinition {
            name: "searchSupportTickets".into(),
            description: "tickets".into(),
            parameters: json!({ "type": "object" }),
        };
        let agent = CompletionRequest::new(vec![Message::user("q", None)], AppMode::BusinessAgent)
            .with_tools(vec![def.clone()]);
        let body = gateway().build_request_body(&agent);
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "searchSupportTickets"
        );

        let support = CompletionRequest::new(vec![Message::user("q", None)], AppMode::Support)
            .with_tools(vec![def]);
        assert!(gateway().build_request_body(&support).get("tools").is_none());
    }

    #[test]
    fn empty_model_messages_are_dropped() {
        assert!(content_for(&Message::model("", vec![])).is_none());
    }
}
