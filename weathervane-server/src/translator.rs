//! Maps runner events onto assistant stream frames.

use std::collections::HashMap;

use futures::{Stream, StreamExt};
use thiserror::Error;
use weathervane_core::{RawModelEvent, RunEvent, RunItem, WeathervaneError};

use crate::assistant_stream::{
    AssistantStreamController, StreamClosed, ToolCallController, ToolCallPartInit, ToolResponse,
};

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Upstream(#[from] WeathervaneError),
    #[error("tool output for unknown call id '{call_id}'")]
    OrphanToolOutput { call_id: String },
    #[error("tool call '{call_id}' opened twice")]
    DuplicateToolCall { call_id: String },
    #[error(transparent)]
    StreamClosed(#[from] StreamClosed),
}

impl TranslateError {
    /// The runner broke its own ordering guarantees.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::OrphanToolOutput { .. } | Self::DuplicateToolCall { .. }
        )
    }
}

/// Tool-call parts that have been opened but not yet resolved, keyed by
/// call id. Scoped to a single request.
#[derive(Debug, Default)]
pub struct PendingToolCalls {
    calls: HashMap<String, ToolCallController>,
}

impl PendingToolCalls {
    pub fn contains(&self, call_id: &str) -> bool {
        self.calls.contains_key(call_id)
    }

    pub fn open(&mut self, controller: ToolCallController) -> Result<(), TranslateError> {
        let call_id = controller.tool_call_id().to_string();
        if self.calls.contains_key(&call_id) {
            return Err(TranslateError::DuplicateToolCall { call_id });
        }
        self.calls.insert(call_id, controller);
        Ok(())
    }

    pub fn take(&mut self, call_id: &str) -> Result<ToolCallController, TranslateError> {
        self.calls
            .remove(call_id)
            .ok_or_else(|| TranslateError::OrphanToolOutput {
                call_id: call_id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Drains `events` into `controller`.
///
/// Text deltas become text frames, tool calls open a tool-call part and tool
/// outputs resolve the matching part. Model output that follows tool results
/// belongs to a new turn and is preceded by a step boundary. Everything else
/// is dropped. The first error ends translation.
pub async fn translate_run<S>(
    events: S,
    controller: &AssistantStreamController,
) -> Result<(), TranslateError>
where
    S: Stream<Item = Result<RunEvent, WeathervaneError>>,
{
    let mut events = std::pin::pin!(events);
    let mut pending = PendingToolCalls::default();
    // Set once tool results have been written; the next model output starts
    // a new step.
    let mut step_has_results = false;

    while let Some(event) = events.next().await {
        let event = event?;
        if step_has_results && opens_model_output(&event) {
            controller.start_next_step().await?;
            step_has_results = false;
        }

        match event {
            RunEvent::RawModelStreamEvent {
                data: RawModelEvent::OutputTextDelta { delta },
            } => controller.append_text(delta).await?,
            RunEvent::RunItemStreamEvent {
                item: RunItem::ToolCallItem { raw_item },
            } => {
                if pending.contains(&raw_item.call_id) {
                    return Err(TranslateError::DuplicateToolCall {
                        call_id: raw_item.call_id,
                    });
                }
                tracing::debug!(
                    call_id = %raw_item.call_id,
                    tool = %raw_item.name,
                    "opening tool call part"
                );
                let tool = controller
                    .add_tool_call_part(ToolCallPartInit {
                        tool_name: raw_item.name,
                        tool_call_id: raw_item.call_id,
                        args_text: raw_item.arguments,
                    })
                    .await?;
                pending.open(tool)?;
            }
            RunEvent::RunItemStreamEvent {
                item: RunItem::ToolCallOutputItem { raw_item },
            } => {
                let tool = pending.take(&raw_item.call_id)?;
                tracing::debug!(
                    call_id = %tool.tool_call_id(),
                    tool = %tool.tool_name(),
                    "resolving tool call part"
                );
                tool.set_response(ToolResponse::new(raw_item.output)).await?;
                step_has_results = true;
            }
            RunEvent::RawModelStreamEvent {
                data: RawModelEvent::ResponseDone,
            }
            | RunEvent::RunItemStreamEvent {
                item: RunItem::MessageOutputItem { .. },
            }
            | RunEvent::AgentUpdatedStreamEvent { .. } => {}
        }
    }

    if !pending.is_empty() {
        tracing::warn!(open = pending.len(), "run ended with unresolved tool calls");
    }
    Ok(())
}

/// Events produced by a model turn, as opposed to tool dispatch.
fn opens_model_output(event: &RunEvent) -> bool {
    matches!(
        event,
        RunEvent::RawModelStreamEvent { .. }
            | RunEvent::RunItemStreamEvent {
                item: RunItem::ToolCallItem { .. } | RunItem::MessageOutputItem { .. },
            }
    )
}
