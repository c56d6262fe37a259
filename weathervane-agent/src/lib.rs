mod agent;
mod error;
mod runner;
mod tooling;

pub use agent::Agent;
pub use error::{ToolDispatchError, ToolSetBuildError};
pub use runner::{RunOptions, Runner, StreamedRun, DEFAULT_MAX_TURNS};
pub use tooling::{
    CancellationToken, ToolCallEnvelope, ToolContext, ToolError, ToolSet, ToolSetBuilder,
    TypedTool,
};
