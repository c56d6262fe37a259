//! HTTP surface for the weather assistant: `POST /api/chat` streams an agent
//! run to the browser as AI SDK data stream frames.

pub mod adapter;
pub mod assistant_stream;
pub mod config;
pub mod error;
pub mod routes;
pub mod telemetry;
pub mod translator;
pub mod weather_agent;

pub use adapter::{to_input_items, ChatMessage, ChatRequest, ChatRole, ContentPart, MessageContent};
pub use config::{Cli, LlmSettings, LogFormat, ServerConfig};
pub use error::ApiError;
pub use routes::{router, AppState, CHAT_PATH, HEALTH_PATH};
pub use telemetry::{init_tracing, TelemetryError};
pub use translator::{translate_run, PendingToolCalls, TranslateError};
pub use weather_agent::{weather_agent, WEATHER_AGENT_INSTRUCTIONS, WEATHER_AGENT_NAME};
