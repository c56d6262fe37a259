use std::collections::BTreeMap;
use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::{json, Value};
use weathervane_core::{
    AgentInputItem, FunctionCall, LlmRequest, LlmStreamEvent, Message, RawModelEvent, Role,
    RunEvent, RunItem, StreamingLlm, ToolCall, WeathervaneError,
};

use crate::{Agent, CancellationToken, ToolCallEnvelope, ToolContext, ToolSet};

pub const DEFAULT_MAX_TURNS: usize = 10;

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub cancellation: CancellationToken,
}

impl RunOptions {
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }
}

/// Drives an agent against a streaming model: each turn streams the model,
/// then dispatches any requested tool calls and feeds their outputs back,
/// until the model answers without calling a tool.
#[derive(Clone)]
pub struct Runner {
    llm: Arc<dyn StreamingLlm>,
    max_turns: usize,
}

impl Runner {
    pub fn new(llm: Arc<dyn StreamingLlm>) -> Self {
        Self {
            llm,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub async fn run_streamed(
        &self,
        agent: Arc<Agent>,
        input: Vec<AgentInputItem>,
        options: RunOptions,
    ) -> Result<StreamedRun, WeathervaneError> {
        if input.is_empty() {
            return Err(WeathervaneError::InvalidInput(
                "run requires at least one input item".to_string(),
            ));
        }
        if options.cancellation.is_cancelled() {
            return Err(WeathervaneError::Cancelled);
        }

        let mut messages = Vec::with_capacity(input.len() + 1);
        if !agent.instructions().is_empty() {
            messages.push(Message::new(Role::System, agent.instructions()));
        }
        messages.extend(input.iter().map(Message::from));

        tracing::info!(
            agent = %agent.name(),
            input_items = input.len(),
            max_turns = self.max_turns,
            "starting streamed run"
        );

        let agent_name = agent.name().to_string();
        let events = run_events(
            self.llm.clone(),
            agent,
            messages,
            self.max_turns,
            options.cancellation,
        );

        Ok(StreamedRun {
            agent_name,
            events: events.boxed(),
        })
    }
}

pub struct StreamedRun {
    agent_name: String,
    events: BoxStream<'static, Result<RunEvent, WeathervaneError>>,
}

impl std::fmt::Debug for StreamedRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamedRun")
            .field("agent_name", &self.agent_name)
            .finish_non_exhaustive()
    }
}

impl StreamedRun {
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<RunEvent, WeathervaneError>> {
        self.events
    }
}

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

fn run_events(
    llm: Arc<dyn StreamingLlm>,
    agent: Arc<Agent>,
    mut messages: Vec<Message>,
    max_turns: usize,
    cancellation: CancellationToken,
) -> impl Stream<Item = Result<RunEvent, WeathervaneError>> + Send + 'static {
    try_stream! {
        yield RunEvent::AgentUpdatedStreamEvent {
            agent_name: agent.name().to_string(),
        };

        for turn in 1..=max_turns {
            tracing::debug!(agent = %agent.name(), turn, "starting model turn");
            let request = LlmRequest {
                model: agent.model().unwrap_or_default().to_string(),
                messages: messages.clone(),
                tools: agent.tools().specs().to_vec(),
            };

            let mut text = String::new();
            // Keyed by the provider's tool call index so fragments land on the
            // right call and calls keep their emitted order.
            let mut pending: BTreeMap<usize, PendingCall> = BTreeMap::new();
            let mut model_stream = llm.stream(request);

            while let Some(event) = next_or_cancelled(&mut model_stream, &cancellation).await? {
                match event? {
                    LlmStreamEvent::TextDelta(delta) => {
                        text.push_str(&delta);
                        yield RunEvent::text_delta(delta);
                    }
                    LlmStreamEvent::ToolCallStart { index, id, name } => {
                        // A repeated start for the same index must not drop
                        // argument fragments already collected.
                        let call = pending.entry(index).or_insert_with(PendingCall::default);
                        if call.id.is_empty() {
                            call.id = id;
                        }
                        if call.name.is_empty() {
                            call.name = name;
                        }
                    }
                    LlmStreamEvent::ToolCallArgumentsDelta { index, delta } => {
                        match pending.get_mut(&index) {
                            Some(call) => call.arguments.push_str(&delta),
                            None => tracing::warn!(index, "argument fragment for unopened tool call dropped"),
                        }
                    }
                    LlmStreamEvent::Finished { finish_reason } => {
                        tracing::debug!(turn, finish_reason = ?finish_reason, "model turn finished");
                    }
                }
            }
            drop(model_stream);

            if !text.is_empty() {
                yield RunEvent::RunItemStreamEvent {
                    item: RunItem::MessageOutputItem { text: text.clone() },
                };
            }

            if pending.is_empty() {
                tracing::info!(agent = %agent.name(), turns = turn, "run completed");
                yield RunEvent::RawModelStreamEvent {
                    data: RawModelEvent::ResponseDone,
                };
                return;
            }

            let calls: Vec<ToolCall> = pending
                .into_values()
                .map(|call| ToolCall {
                    id: call.id,
                    name: call.name,
                    arguments: call.arguments,
                })
                .collect();

            let mut assistant = Message::new(Role::Assistant, text);
            assistant.tool_calls = calls.clone();
            messages.push(assistant);

            for call in &calls {
                yield RunEvent::tool_called(FunctionCall {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
            }

            for call in calls {
                let output = invoke_tool(agent.tools(), &call, turn, &cancellation).await?;
                messages.push(Message::tool_result(call.id.clone(), output.to_string()));
                yield RunEvent::tool_output(call.id, output);
            }
        }

        tracing::warn!(agent = %agent.name(), max_turns, "run exceeded max turns");
        Err::<(), _>(WeathervaneError::MaxTurnsExceeded { max: max_turns })?;
    }
}

async fn next_or_cancelled<S>(
    stream: &mut S,
    cancellation: &CancellationToken,
) -> Result<Option<S::Item>, WeathervaneError>
where
    S: Stream + Unpin,
{
    tokio::select! {
        biased;
        _ = cancellation.cancelled() => Err(WeathervaneError::Cancelled),
        item = stream.next() => Ok(item),
    }
}

/// Runs one tool call. Only cancellation is an error here; anything the tool
/// itself gets wrong is reported back to the model as an `{"error": ...}`
/// output so it can recover.
async fn invoke_tool(
    tools: &ToolSet,
    call: &ToolCall,
    turn: usize,
    cancellation: &CancellationToken,
) -> Result<Value, WeathervaneError> {
    let args = if call.arguments.trim().is_empty() {
        json!({})
    } else {
        match serde_json::from_str::<Value>(&call.arguments) {
            Ok(args) => args,
            Err(err) => {
                tracing::warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    error = %err,
                    "tool arguments are not valid JSON"
                );
                return Ok(tool_error_output(format!("invalid tool arguments: {err}")));
            }
        }
    };

    let envelope = ToolCallEnvelope {
        name: call.name.clone(),
        args,
        call_id: call.id.clone(),
    };
    let ctx = ToolContext {
        call_id: call.id.clone(),
        turn,
        cancellation: cancellation.child_token(),
    };

    let result = tokio::select! {
        biased;
        _ = cancellation.cancelled() => return Err(WeathervaneError::Cancelled),
        result = tools.dispatch(envelope, ctx) => result,
    };

    match result {
        Ok(output) => {
            tracing::debug!(tool = %call.name, call_id = %call.id, "tool call completed");
            Ok(output)
        }
        Err(err) => {
            tracing::warn!(tool = %call.name, call_id = %call.id, error = %err, "tool call failed");
            Ok(tool_error_output(err.to_string()))
        }
    }
}

fn tool_error_output(message: String) -> Value {
    json!({ "error": message })
}
