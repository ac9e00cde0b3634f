//! Streaming client for OpenAI-compatible chat-completions endpoints.
//!
//! Every built-in provider speaks this protocol; they differ only in base
//! URL, auth header, and query parameters.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::OgentError;
use crate::types::{
    AgentToolCall, ContentPart, FinishReason, ModelMessage, Role, TextStreamDelta, Usage,
};

use super::http::{auth_headers, parse_sse_data, shared_client, status_to_error, Auth, SSE_DONE};
use super::{DeltaStream, ModelProvider, ProviderRequest};

/// A chat-completions backend for one model.
#[derive(Debug, Clone)]
pub struct ChatCompletionsProvider {
    provider_name: String,
    model: String,
    url: String,
    auth: Auth,
    extra_headers: Vec<(&'static str, String)>,
}

impl ChatCompletionsProvider {
    /// `base_url` is the API root; `/chat/completions` is appended.
    pub fn new(
        provider_name: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
        auth: Auth,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            model: model.into(),
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            auth,
            extra_headers: Vec::new(),
        }
    }

    /// Append a query parameter to the endpoint URL.
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        self.url = format!("{}{sep}{key}={value}", self.url);
        self
    }

    /// Send an extra static header with every request.
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.extra_headers.push((name, value.into()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    fn build_request_body(&self, request: &ProviderRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().flat_map(message_to_wire).collect();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), self.model.clone().into());
        body.insert("messages".into(), messages.into());
        body.insert("stream".into(), true.into());

        if let Some(max) = request.settings.max_tokens {
            body.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = request.settings.temperature {
            body.insert("temperature".into(), temp.into());
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), tools.into());
        }

        Value::Object(body)
    }
}

#[async_trait]
impl ModelProvider for ChatCompletionsProvider {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream_text(&self, request: &ProviderRequest) -> Result<DeltaStream, OgentError> {
        let body = self.build_request_body(request);
        debug!(
            provider = %self.provider_name,
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "chat completions stream_text"
        );

        let mut headers = auth_headers(&self.auth);
        for (name, value) in &self.extra_headers {
            if let Ok(value) = reqwest::header::HeaderValue::from_str(value) {
                headers.insert(*name, value);
            }
        }

        let resp = shared_client()
            .post(&self.url)
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &body_text));
        }

        let provider = self.provider_name.clone();
        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            // Raw bytes: a chunk boundary may split a multibyte character.
            let mut buffer: Vec<u8> = Vec::new();
            let mut state = StreamState::default();
            futures::pin_mut!(byte_stream);

            'read: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(OgentError::Network(e));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = match std::str::from_utf8(&raw) {
                        Ok(line) => line.trim().to_string(),
                        Err(error) => {
                            debug!(%error, "skipping stream line that is not UTF-8");
                            continue;
                        }
                    };

                    let Some(data) = parse_sse_data(&line) else {
                        continue;
                    };
                    if data == SSE_DONE {
                        break 'read;
                    }
                    match state.apply(data) {
                        Ok(deltas) => {
                            for delta in deltas {
                                yield Ok(delta);
                            }
                        }
                        Err(ChunkError::Upstream(message)) => {
                            yield Err(OgentError::Provider { provider: provider.clone(), message });
                            return;
                        }
                        Err(ChunkError::Malformed(error)) => {
                            debug!(%error, "skipping unparseable stream chunk");
                        }
                    }
                }
            }

            for delta in state.finish() {
                yield Ok(delta);
            }
        };

        Ok(Box::pin(stream))
    }
}

fn message_to_wire(msg: &ModelMessage) -> Vec<Value> {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    if msg.role == Role::Tool {
        return msg
            .content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolResult(tr) => Some(json!({
                    "role": "tool",
                    "tool_call_id": tr.tool_call_id,
                    "content": match &tr.result {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                })),
                _ => None,
            })
            .collect();
    }

    let text = msg.text();
    let tool_calls = msg.tool_calls();
    if tool_calls.is_empty() {
        return vec![json!({ "role": role, "content": text })];
    }

    let calls: Vec<Value> = tool_calls
        .iter()
        .map(|tc| {
            json!({
                "id": tc.id,
                "type": "function",
                "function": {
                    "name": tc.name,
                    "arguments": tc.arguments.to_string(),
                }
            })
        })
        .collect();
    vec![json!({
        "role": role,
        "content": if text.is_empty() { Value::Null } else { Value::String(text) },
        "tool_calls": calls,
    })]
}

enum ChunkError {
    Upstream(String),
    Malformed(serde_json::Error),
}

#[derive(Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Accumulates one streamed response.
///
/// Text is passed through as it arrives. Tool-call fragments are assembled
/// by index and emitted whole when the stream ends, followed by `Done`.
#[derive(Default)]
struct StreamState {
    calls: BTreeMap<u32, PartialToolCall>,
    finish: Option<FinishReason>,
    usage: Option<Usage>,
}

impl StreamState {
    fn apply(&mut self, data: &str) -> Result<Vec<TextStreamDelta>, ChunkError> {
        let value: Value = serde_json::from_str(data).map_err(ChunkError::Malformed)?;
        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ChunkError::Upstream(message));
        }
        let chunk: WireChunk = serde_json::from_value(value).map_err(ChunkError::Malformed)?;

        if let Some(usage) = chunk.usage {
            self.usage = Some(Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }

        let mut deltas = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                deltas.push(TextStreamDelta::text(text));
            }
            for (position, fragment) in choice.delta.tool_calls.into_iter().enumerate() {
                self.apply_tool_fragment(position as u32, fragment);
            }
            if let Some(reason) = choice.finish_reason.as_deref() {
                self.finish = FinishReason::from_wire(reason).or(self.finish);
            }
        }
        Ok(deltas)
    }

    fn apply_tool_fragment(&mut self, position: u32, fragment: WireToolCallDelta) {
        let key = match (fragment.index, fragment.id.as_deref()) {
            (Some(index), _) => index,
            // Servers that omit the index send each call whole with its own id.
            (None, Some(id)) => self
                .calls
                .iter()
                .find(|(_, call)| call.id.as_deref() == Some(id))
                .map(|(key, _)| *key)
                .unwrap_or_else(|| self.calls.keys().next_back().map_or(0, |k| k + 1)),
            (None, None) => position,
        };

        let call = self.calls.entry(key).or_default();
        if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
            call.id = Some(id);
        }
        if let Some(function) = fragment.function {
            if let Some(name) = function.name {
                call.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                call.arguments.push_str(&arguments);
            }
        }
    }

    fn finish(self) -> Vec<TextStreamDelta> {
        let has_calls = !self.calls.is_empty();
        let mut deltas: Vec<TextStreamDelta> = self
            .calls
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| {
                let arguments = if call.arguments.trim().is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(&call.arguments)
                        .unwrap_or(Value::String(call.arguments))
                };
                TextStreamDelta::tool_call(AgentToolCall {
                    id: call
                        .id
                        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                    name: call.name,
                    arguments,
                })
            })
            .collect();

        let finish = match self.finish {
            Some(reason) => reason,
            None if has_calls => FinishReason::ToolCalls,
            None => FinishReason::Stop,
        };
        deltas.push(TextStreamDelta::done(Some(finish), self.usage));
        deltas
    }
}

#[derive(Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: WireDelta,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct WireDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCallDelta>,
}

#[derive(Deserialize)]
struct WireToolCallDelta {
    index: Option<u32>,
    id: Option<String>,
    function: Option<WireFunctionDelta>,
}

#[derive(Deserialize)]
struct WireFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StreamEventType;

    fn apply_all(state: &mut StreamState, chunks: &[&str]) -> Vec<TextStreamDelta> {
        chunks
            .iter()
            .flat_map(|c| state.apply(c).ok().unwrap_or_default())
            .collect()
    }

    #[test]
    fn text_passes_through_and_done_is_last() {
        let mut state = StreamState::default();
        let text = apply_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
                r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":"stop"}]}"#,
            ],
        );
        assert_eq!(text.len(), 2);
        assert_eq!(text[0].text, "Hel");

        let tail = state.finish();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].event_type, StreamEventType::Done);
        assert_eq!(tail[0].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn tool_call_fragments_are_assembled_by_index() {
        let mut state = StreamState::default();
        apply_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"obsidian-search-notes","arguments":"{\"qu"}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"ery\":\"rust\"}"}}]}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}],"usage":{"prompt_tokens":5,"completion_tokens":7,"total_tokens":12}}"#,
            ],
        );

        let tail = state.finish();
        assert_eq!(tail.len(), 2);
        let call = tail[0].tool_call.as_ref().unwrap();
        assert_eq!(call.id, "call_1");
        assert_eq!(call.name, "obsidian-search-notes");
        assert_eq!(call.arguments, json!({ "query": "rust" }));
        assert_eq!(tail[1].finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(tail[1].usage.as_ref().map(|u| u.total_tokens), Some(12));
    }

    #[test]
    fn calls_without_index_are_kept_apart() {
        let mut state = StreamState::default();
        apply_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"id":"a","function":{"name":"one","arguments":"{}"}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"id":"b","function":{"name":"two","arguments":"{}"}}]}}]}"#,
            ],
        );
        let tail = state.finish();
        let names: Vec<_> = tail
            .iter()
            .filter_map(|d| d.tool_call.as_ref().map(|c| c.name.as_str()))
            .collect();
        assert_eq!(names, vec!["one", "two"]);
        assert_eq!(tail.last().unwrap().finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn upstream_error_chunks_are_reported() {
        let mut state = StreamState::default();
        let err = state
            .apply(r#"{"error":{"message":"overloaded"}}"#)
            .err()
            .unwrap();
        assert!(matches!(err, ChunkError::Upstream(ref m) if m == "overloaded"));
    }

    #[test]
    fn tool_results_are_sent_as_tool_messages() {
        let wire = message_to_wire(&ModelMessage::tool_result("c1", json!({"ok": true}), false));
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], "tool");
        assert_eq!(wire[0]["tool_call_id"], "c1");
        assert_eq!(wire[0]["content"], r#"{"ok":true}"#);
    }

    #[test]
    fn request_body_declares_tools() {
        let provider = ChatCompletionsProvider::new("openai", "gpt-4o", "https://x/v1/", Auth::None);
        assert_eq!(provider.url(), "https://x/v1/chat/completions");

        let request = ProviderRequest {
            messages: vec![ModelMessage::user("hi")],
            tools: vec![super::super::ToolDefinition {
                name: "t".into(),
                description: "d".into(),
                parameters: json!({"type": "object"}),
            }],
            ..Default::default()
        };
        let body = provider.build_request_body(&request);
        assert_eq!(body["stream"], true);
        assert_eq!(body["tools"][0]["function"]["name"], "t");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn with_query_appends_parameters() {
        let provider = ChatCompletionsProvider::new("azure", "gpt", "https://r/openai/deployments/gpt", Auth::None)
            .with_query("api-version", "2024-10-21");
        assert!(provider.url().ends_with("/chat/completions?api-version=2024-10-21"));
    }
}
