use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use secrecy::SecretString;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TURNS: usize = 10;
pub const DEFAULT_MAX_DURATION_SECS: u64 = 30;
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;
pub const DEFAULT_EVENT_BUFFER: usize = 64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Command-line flags. Every flag can also be set through its environment
/// variable, and a `.env` file is read before parsing.
#[derive(Parser)]
#[command(name = "weathervane", version)]
#[command(about = "Streaming chat endpoint for the weather assistant")]
pub struct Cli {
    #[arg(long, env = "WEATHERVANE_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com")]
    pub llm_base_url: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "WEATHERVANE_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, env = "WEATHERVANE_MAX_TURNS", default_value_t = DEFAULT_MAX_TURNS)]
    pub max_turns: usize,

    #[arg(
        long,
        env = "WEATHERVANE_MAX_DURATION_SECS",
        default_value_t = DEFAULT_MAX_DURATION_SECS
    )]
    pub max_duration_secs: u64,

    #[arg(long, env = "WEATHERVANE_BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,

    #[arg(long, env = "WEATHERVANE_EVENT_BUFFER", default_value_t = DEFAULT_EVENT_BUFFER)]
    pub event_buffer: usize,

    #[arg(long, env = "WEATHERVANE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Settings the HTTP layer reads per request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub max_turns: usize,
    pub max_duration: Duration,
    pub body_limit: usize,
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_turns: DEFAULT_MAX_TURNS,
            max_duration: Duration::from_secs(DEFAULT_MAX_DURATION_SECS),
            body_limit: DEFAULT_BODY_LIMIT,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
}

impl Cli {
    pub fn into_parts(self) -> (ServerConfig, LlmSettings) {
        let server = ServerConfig {
            bind: self.bind,
            max_turns: self.max_turns,
            max_duration: Duration::from_secs(self.max_duration_secs),
            body_limit: self.body_limit,
            event_buffer: self.event_buffer,
        };
        let llm = LlmSettings {
            base_url: self.llm_base_url,
            api_key: SecretString::new(self.api_key),
            model: self.model,
        };
        (server, llm)
    }
}
