use serde::{Deserialize, Serialize};

use crate::Value;

/// A unit of the runner's streamed output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RawModelStreamEvent { data: RawModelEvent },
    RunItemStreamEvent { item: RunItem },
    AgentUpdatedStreamEvent { agent_name: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawModelEvent {
    OutputTextDelta { delta: String },
    ResponseDone,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunItem {
    ToolCallItem { raw_item: FunctionCall },
    ToolCallOutputItem { raw_item: FunctionCallOutput },
    MessageOutputItem { text: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallOutput {
    pub call_id: String,
    pub output: Value,
}

impl RunEvent {
    pub fn text_delta(delta: impl Into<String>) -> Self {
        Self::RawModelStreamEvent {
            data: RawModelEvent::OutputTextDelta {
                delta: delta.into(),
            },
        }
    }

    pub fn tool_called(call: FunctionCall) -> Self {
        Self::RunItemStreamEvent {
            item: RunItem::ToolCallItem { raw_item: call },
        }
    }

    pub fn tool_output(call_id: impl Into<String>, output: Value) -> Self {
        Self::RunItemStreamEvent {
            item: RunItem::ToolCallOutputItem {
                raw_item: FunctionCallOutput {
                    call_id: call_id.into(),
                    output,
                },
            },
        }
    }

    /// The tool call id carried by item events, if any.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::RunItemStreamEvent {
                item: RunItem::ToolCallItem { raw_item },
            } => Some(raw_item.call_id.as_str()),
            Self::RunItemStreamEvent {
                item: RunItem::ToolCallOutputItem { raw_item },
            } => Some(raw_item.call_id.as_str()),
            _ => None,
        }
    }
}
