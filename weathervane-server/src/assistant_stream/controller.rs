use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;

use super::chunk::{new_message_id, AssistantStreamChunk, FinishReason};

/// The receiving half of the stream went away, usually because the client
/// disconnected.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("assistant stream closed")]
pub struct StreamClosed;

/// Writes frames into one response body. There is exactly one controller per
/// response, so frames are never interleaved by concurrent writers.
#[derive(Debug)]
pub struct AssistantStreamController {
    tx: mpsc::Sender<AssistantStreamChunk>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolCallPartInit {
    pub tool_name: String,
    pub tool_call_id: String,
    /// Complete argument JSON as produced by the model.
    pub args_text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolResponse {
    pub result: Value,
}

impl ToolResponse {
    pub fn new(result: Value) -> Self {
        Self { result }
    }
}

impl From<Value> for ToolResponse {
    fn from(result: Value) -> Self {
        Self::new(result)
    }
}

impl AssistantStreamController {
    pub(crate) fn new(tx: mpsc::Sender<AssistantStreamChunk>) -> Self {
        Self { tx }
    }

    /// Controller wired to a bare channel, without an HTTP response around it.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<AssistantStreamChunk>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    pub async fn append_text(&self, text: impl Into<String>) -> Result<(), StreamClosed> {
        let text = text.into();
        if text.is_empty() {
            return Ok(());
        }
        send(&self.tx, AssistantStreamChunk::TextDelta(text)).await
    }

    /// Closes the current step as a tool-call step and opens the next one.
    /// Called once per model turn that follows tool results.
    pub async fn start_next_step(&self) -> Result<(), StreamClosed> {
        send(
            &self.tx,
            AssistantStreamChunk::FinishStep {
                finish_reason: FinishReason::ToolCalls,
            },
        )
        .await?;
        send(
            &self.tx,
            AssistantStreamChunk::StartStep {
                message_id: new_message_id(),
            },
        )
        .await
    }

    /// Opens a tool-call part and emits its arguments. The returned handle
    /// attaches the result once the tool has run.
    pub async fn add_tool_call_part(
        &self,
        part: ToolCallPartInit,
    ) -> Result<ToolCallController, StreamClosed> {
        let ToolCallPartInit {
            tool_name,
            tool_call_id,
            args_text,
        } = part;

        send(
            &self.tx,
            AssistantStreamChunk::ToolCallBegin {
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
            },
        )
        .await?;

        if !args_text.is_empty() {
            send(
                &self.tx,
                AssistantStreamChunk::ToolCallArgsTextDelta {
                    tool_call_id: tool_call_id.clone(),
                    args_text_delta: args_text.clone(),
                },
            )
            .await?;
        }

        let args = serde_json::from_str(&args_text).unwrap_or_else(|_| json!({}));
        send(
            &self.tx,
            AssistantStreamChunk::ToolCall {
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                args,
            },
        )
        .await?;

        Ok(ToolCallController {
            tool_call_id,
            tool_name,
            tx: self.tx.clone(),
        })
    }
}

/// Handle for one open tool-call part.
#[derive(Debug)]
pub struct ToolCallController {
    tool_call_id: String,
    tool_name: String,
    tx: mpsc::Sender<AssistantStreamChunk>,
}

impl ToolCallController {
    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Consumes the handle, so a part can only be resolved once.
    pub async fn set_response(self, response: ToolResponse) -> Result<(), StreamClosed> {
        send(
            &self.tx,
            AssistantStreamChunk::ToolResult {
                tool_call_id: self.tool_call_id,
                result: response.result,
            },
        )
        .await
    }
}

pub(crate) async fn send(
    tx: &mpsc::Sender<AssistantStreamChunk>,
    chunk: AssistantStreamChunk,
) -> Result<(), StreamClosed> {
    tx.send(chunk).await.map_err(|_| StreamClosed)
}
