//! Incremental response writer for the AI SDK data stream protocol.
//!
//! Handlers write text and tool-call parts through an
//! [`AssistantStreamController`]; the frames reach the client in the order
//! they were written.

mod chunk;
mod controller;
mod response;

pub use chunk::{AssistantStreamChunk, FinishReason};
pub use controller::{
    AssistantStreamController, StreamClosed, ToolCallController, ToolCallPartInit, ToolResponse,
};
pub use response::{
    create_assistant_stream_response, DATA_STREAM_CONTENT_TYPE, DATA_STREAM_HEADER,
    DATA_STREAM_VERSION,
};
