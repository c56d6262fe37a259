//! Generic OpenAI-compatible streaming chat client
//!
//! Supports any provider using OpenAI's chat completions format (OpenAI, DeepSeek,
//! Together, local gateways, etc.)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures::{
    future,
    stream::{self, StreamExt},
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use weathervane_core::{
    LlmRequest, LlmStream, LlmStreamEvent, Message, Role, StreamingLlm, ToolSpec,
    WeathervaneError,
};

/// Request body for chat completions endpoint
#[derive(Serialize, Debug, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<WireToolCall>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: WireFunction,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WireFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: WireFunctionSpec,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WireFunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let content = if message.content.is_empty() && !message.tool_calls.is_empty() {
            None
        } else {
            Some(message.content.clone())
        };

        Self {
            role: message.role,
            content,
            tool_call_id: message.tool_call_id.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: "function",
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
        }
    }
}

impl From<&ToolSpec> for WireTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            kind: "function",
            function: WireFunctionSpec {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

/// Streaming chunk (server-sent events)
#[derive(Deserialize, Debug, Clone)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallChunk>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ToolCallChunk {
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionChunk>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct FunctionChunk {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// OpenAI-style error response
#[derive(Deserialize, Debug, Clone)]
pub struct OpenAiError {
    pub error: ErrorDetail,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<String>,
}

/// Map one streamed chunk to the provider-neutral events it carries.
///
/// A tool call delta that carries an `id` opens the call; `arguments`
/// fragments are forwarded as they arrive and keyed by the call's index.
pub fn chunk_events(chunk: ChatCompletionChunk) -> Vec<LlmStreamEvent> {
    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                events.push(LlmStreamEvent::TextDelta(content));
            }
        }

        for call in choice.delta.tool_calls.unwrap_or_default() {
            let function = call.function.unwrap_or_default();
            if let Some(id) = call.id {
                events.push(LlmStreamEvent::ToolCallStart {
                    index: call.index,
                    id,
                    name: function.name.unwrap_or_default(),
                });
            }
            if let Some(arguments) = function.arguments {
                if !arguments.is_empty() {
                    events.push(LlmStreamEvent::ToolCallArgumentsDelta {
                        index: call.index,
                        delta: arguments,
                    });
                }
            }
        }

        if let Some(reason) = choice.finish_reason {
            events.push(LlmStreamEvent::Finished {
                finish_reason: Some(reason),
            });
        }
    }
    events
}

#[derive(Default)]
pub struct OpenAiCompatibleBuilder {
    base_url: Option<Url>,
    api_key: Option<SecretString>,
    default_model: Option<String>,
    timeout: Option<Duration>,
    temperature: Option<f32>,
}

impl OpenAiCompatibleBuilder {
    pub fn base_url(mut self, base_url: impl AsRef<str>) -> Result<Self, WeathervaneError> {
        let url = Url::parse(base_url.as_ref()).map_err(|err| {
            WeathervaneError::InvalidConfig(format!("invalid base url: {err}"))
        })?;
        self.base_url = Some(url);
        Ok(self)
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into()));
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn build(self) -> Result<OpenAiCompatibleClient, WeathervaneError> {
        let base_url = self
            .base_url
            .ok_or_else(|| WeathervaneError::InvalidConfig("base url is required".to_string()))?;
        let api_key = self
            .api_key
            .ok_or_else(|| WeathervaneError::InvalidConfig("api key is required".to_string()))?;
        let default_model = self
            .default_model
            .ok_or_else(|| WeathervaneError::InvalidConfig("default model is required".to_string()))?;

        let http = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(120)))
            .build()
            .map_err(|err| WeathervaneError::LlmProvider(err.to_string()))?;

        Ok(OpenAiCompatibleClient {
            base_url,
            api_key,
            default_model,
            temperature: self.temperature,
            http,
        })
    }
}

#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    base_url: Url,
    api_key: SecretString,
    default_model: String,
    temperature: Option<f32>,
    http: Client,
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("base_url", &self.base_url.as_str())
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleClient {
    pub fn builder() -> OpenAiCompatibleBuilder {
        OpenAiCompatibleBuilder::default()
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    pub fn build_request(&self, request: LlmRequest) -> ChatCompletionRequest {
        let LlmRequest {
            model,
            messages,
            tools,
        } = request;
        let model = if model.is_empty() {
            self.default_model.clone()
        } else {
            model
        };
        let tools = if tools.is_empty() {
            None
        } else {
            Some(tools.iter().map(WireTool::from).collect())
        };

        ChatCompletionRequest {
            model,
            messages: messages.iter().map(WireMessage::from).collect(),
            tools,
            temperature: self.temperature,
            stream: true,
        }
    }
}

impl StreamingLlm for OpenAiCompatibleClient {
    fn stream(&self, request: LlmRequest) -> LlmStream<'_> {
        let body = self.build_request(request);
        let url = self.completions_url();
        tracing::debug!(
            model = %body.model,
            messages = body.messages.len(),
            url = %url,
            "sending streaming chat completion request"
        );

        let send = self
            .http
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send();

        stream::once(async move {
            let response = send
                .await
                .map_err(|err| WeathervaneError::LlmProvider(err.to_string()))?;
            ensure_success(response).await
        })
        .flat_map(|result| match result {
            Ok(response) => parse_stream_response(response),
            Err(err) => stream::once(future::ready(Err(err))).boxed(),
        })
        .boxed()
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, WeathervaneError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<OpenAiError>(&body)
        .map(|err| err.error.message)
        .unwrap_or(body);
    tracing::warn!(status = %status, error = %message, "chat completion request rejected");
    Err(WeathervaneError::LlmProvider(format!("{status}: {message}")))
}

fn parse_sse_line(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix("data:")
        .map(str::trim_start)
}

fn parse_stream_response(response: reqwest::Response) -> LlmStream<'static> {
    let mut buffer = BytesMut::new();
    let terminated = Arc::new(AtomicBool::new(false));
    let terminated_for_take = terminated.clone();

    // `None` marks the end of the body, so a last line without a trailing
    // newline is still parsed.
    response
        .bytes_stream()
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .take_while(move |_| future::ready(!terminated_for_take.load(Ordering::SeqCst)))
        .flat_map(move |chunk| match chunk {
            Some(Ok(bytes)) => {
                buffer.extend_from_slice(&bytes);
                stream::iter(drain_lines(&mut buffer, &terminated, false))
            }
            Some(Err(err)) => {
                terminated.store(true, Ordering::SeqCst);
                stream::iter(vec![Err(WeathervaneError::LlmProvider(err.to_string()))])
            }
            None => stream::iter(drain_lines(&mut buffer, &terminated, true)),
        })
        .boxed()
}

/// Parses every complete line in `buffer`. With `at_end` set, whatever is
/// left after the last newline counts as a line too.
fn drain_lines(
    buffer: &mut BytesMut,
    terminated: &AtomicBool,
    at_end: bool,
) -> Vec<Result<LlmStreamEvent, WeathervaneError>> {
    let mut events = Vec::new();

    loop {
        let line = match buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => buffer.split_to(pos + 1),
            None if at_end && !buffer.is_empty() => buffer.split(),
            None => break,
        };
        let line_str = String::from_utf8_lossy(&line);
        let Some(data) = parse_sse_line(&line_str) else {
            continue;
        };

        if data == "[DONE]" {
            terminated.store(true, Ordering::SeqCst);
            break;
        }

        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => events.extend(chunk_events(chunk).into_iter().map(Ok)),
            Err(err) => {
                terminated.store(true, Ordering::SeqCst);
                events.push(Err(WeathervaneError::ParseFailed {
                    output: data.to_string(),
                    reason: err.to_string(),
                }));
                break;
            }
        }
    }

    events
}
