use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeathervaneError {
    #[error("LLM provider failed: {0}")]
    LlmProvider(String),
    #[error("Parsing failed on output '{output}': {reason}")]
    ParseFailed { output: String, reason: String },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Max turns ({max}) exceeded")]
    MaxTurnsExceeded { max: usize },
    #[error("Operation was cancelled")]
    Cancelled,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl WeathervaneError {
    /// Whether the error was caused by the caller's input rather than the
    /// runtime or a provider.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
