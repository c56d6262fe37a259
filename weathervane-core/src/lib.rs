mod error;
mod input;
mod llm;
mod run_event;
mod tool;

pub use error::WeathervaneError;
pub use input::{AgentInputItem, InputContent, InputRole, ItemStatus};
pub use llm::{
    LlmRequest, LlmStream, LlmStreamEvent, Message, Role, StreamingLlm, ToolCall, ToolSpec,
};
pub use run_event::{FunctionCall, FunctionCallOutput, RawModelEvent, RunEvent, RunItem};
pub use serde_json::Value;
pub use tool::ToolError;
