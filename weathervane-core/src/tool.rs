use thiserror::Error;

/// Failure raised inside a tool body. The runner reports it back to the
/// model as the call's output rather than ending the run.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool failed: {0}")]
    ExecutionFailed(String),
}
