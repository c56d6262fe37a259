// OpenAI-compatible client (any provider speaking /v1/chat/completions)
pub mod openai_compatible;

pub use openai_compatible::{
    chunk_events, ChatCompletionChunk, ChatCompletionRequest, OpenAiCompatibleBuilder,
    OpenAiCompatibleClient,
};
pub use weathervane_core::{
    LlmRequest, LlmStreamEvent, Message, Role, StreamingLlm, ToolCall, ToolSpec,
};
