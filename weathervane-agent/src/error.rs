use thiserror::Error;

use crate::ToolError;

#[derive(Debug, Error)]
pub enum ToolDispatchError {
    #[error("unknown tool '{name}' (call {call_id})")]
    UnknownTool { name: String, call_id: String },
    #[error("invalid arguments for '{name}' (call {call_id}): {source}")]
    InvalidArgs {
        name: String,
        call_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("tool '{name}' failed (call {call_id}): {source}")]
    Execution {
        name: String,
        call_id: String,
        #[source]
        source: ToolError,
    },
    #[error("could not serialize output of '{name}' (call {call_id}): {source}")]
    Serialization {
        name: String,
        call_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ToolDispatchError {
    pub fn call_id(&self) -> &str {
        match self {
            Self::UnknownTool { call_id, .. }
            | Self::InvalidArgs { call_id, .. }
            | Self::Execution { call_id, .. }
            | Self::Serialization { call_id, .. } => call_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ToolSetBuildError {
    #[error("tool name must not be empty or whitespace: {name:?}")]
    InvalidName { name: String },
    #[error("duplicate tool name: {name}")]
    DuplicateName { name: String },
    #[error("argument schema for {name} could not be encoded: {reason}")]
    InvalidSchema { name: String, reason: String },
}
