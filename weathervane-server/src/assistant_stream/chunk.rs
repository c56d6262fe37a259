use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Error,
}

impl FinishReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::ToolCalls => "tool-calls",
            Self::Error => "error",
        }
    }
}

/// One frame of the data stream. Each frame encodes to a single line of the
/// form `<code>:<json>\n`.
#[derive(Clone, Debug, PartialEq)]
pub enum AssistantStreamChunk {
    StartStep {
        message_id: String,
    },
    TextDelta(String),
    ToolCallBegin {
        tool_call_id: String,
        tool_name: String,
    },
    ToolCallArgsTextDelta {
        tool_call_id: String,
        args_text_delta: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    FinishStep {
        finish_reason: FinishReason,
    },
    FinishMessage {
        finish_reason: FinishReason,
    },
    Error(String),
}

/// Fresh id for a start-step frame.
pub(crate) fn new_message_id() -> String {
    format!("msg-{}", uuid::Uuid::new_v4().simple())
}

fn frame(code: char, payload: Value) -> String {
    format!("{code}:{payload}\n")
}

impl AssistantStreamChunk {
    pub fn code(&self) -> char {
        match self {
            Self::StartStep { .. } => 'f',
            Self::TextDelta(_) => '0',
            Self::ToolCallBegin { .. } => 'b',
            Self::ToolCallArgsTextDelta { .. } => 'c',
            Self::ToolCall { .. } => '9',
            Self::ToolResult { .. } => 'a',
            Self::FinishStep { .. } => 'e',
            Self::FinishMessage { .. } => 'd',
            Self::Error(_) => '3',
        }
    }

    pub fn encode(&self) -> String {
        let payload = match self {
            Self::StartStep { message_id } => json!({ "messageId": message_id }),
            Self::TextDelta(text) => json!(text),
            Self::ToolCallBegin {
                tool_call_id,
                tool_name,
            } => json!({
                "toolCallId": tool_call_id,
                "toolName": tool_name,
            }),
            Self::ToolCallArgsTextDelta {
                tool_call_id,
                args_text_delta,
            } => json!({
                "toolCallId": tool_call_id,
                "argsTextDelta": args_text_delta,
            }),
            Self::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => json!({
                "toolCallId": tool_call_id,
                "toolName": tool_name,
                "args": args,
            }),
            Self::ToolResult {
                tool_call_id,
                result,
            } => json!({
                "toolCallId": tool_call_id,
                "result": result,
            }),
            Self::FinishStep { finish_reason } => json!({
                "finishReason": finish_reason.as_str(),
                "isContinued": false,
            }),
            Self::FinishMessage { finish_reason } => json!({
                "finishReason": finish_reason.as_str(),
            }),
            Self::Error(message) => json!(message),
        };
        frame(self.code(), payload)
    }
}
