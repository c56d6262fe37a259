use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::ExposeSecret;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use weathervane_agent::{Agent, RunOptions, Runner};
use weathervane_core::{StreamingLlm, WeathervaneError};
use weathervane_llm::OpenAiCompatibleClient;

use crate::adapter::{to_input_items, ChatRequest};
use crate::assistant_stream::create_assistant_stream_response;
use crate::config::{LlmSettings, ServerConfig};
use crate::error::ApiError;
use crate::translator::{translate_run, TranslateError};
use crate::weather_agent::weather_agent;

pub const CHAT_PATH: &str = "/api/chat";
pub const HEALTH_PATH: &str = "/health";

/// Shared by every request. The runner and agent are immutable after
/// startup.
#[derive(Clone)]
pub struct AppState {
    runner: Runner,
    agent: Arc<Agent>,
    config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(runner: Runner, agent: Arc<Agent>, config: ServerConfig) -> Self {
        Self {
            runner,
            agent,
            config: Arc::new(config),
        }
    }

    /// Wires the OpenAI-compatible client and the weather agent.
    pub fn from_settings(
        config: ServerConfig,
        llm: LlmSettings,
    ) -> Result<Self, WeathervaneError> {
        let client = OpenAiCompatibleClient::builder()
            .base_url(&llm.base_url)?
            .api_key(llm.api_key.expose_secret().clone())
            .default_model(llm.model)
            .build()?;
        let llm: Arc<dyn StreamingLlm> = Arc::new(client);
        let runner = Runner::new(llm).max_turns(config.max_turns);
        let agent = weather_agent().map_err(|err| WeathervaneError::InvalidConfig(err.to_string()))?;
        Ok(Self::new(runner, Arc::new(agent), config))
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.body_limit;
    Router::new()
        .route(CHAT_PATH, post(chat))
        .route(HEALTH_PATH, get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    if request.messages.is_empty() {
        return Err(ApiError::InvalidRequest(
            "messages must not be empty".to_string(),
        ));
    }

    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id, messages = request.messages.len());
    let input = to_input_items(&request.messages);

    let cancellation = CancellationToken::new();
    let run = state
        .runner
        .run_streamed(
            state.agent.clone(),
            input,
            RunOptions::with_cancellation(cancellation.clone()),
        )
        .instrument(span.clone())
        .await?;
    spawn_deadline(cancellation.clone(), state.config.max_duration);
    span.in_scope(|| tracing::info!(agent = %run.agent_name(), "chat run started"));

    let events = run.into_stream();
    let response = create_assistant_stream_response(
        state.config.event_buffer,
        cancellation,
        move |controller| {
            async move {
                let result = translate_run(events, &controller).await;
                match &result {
                    Ok(()) => tracing::info!("chat run completed"),
                    Err(err) => log_translate_error(err),
                }
                result
            }
            .instrument(span)
        },
    );
    Ok(response)
}

fn log_translate_error(err: &TranslateError) {
    match err {
        TranslateError::StreamClosed(_) => tracing::info!("client disconnected mid-stream"),
        TranslateError::Upstream(WeathervaneError::Cancelled) => {
            tracing::warn!("chat run cancelled")
        }
        err if err.is_protocol_violation() => {
            tracing::error!(error = %err, "runner emitted an inconsistent tool-call sequence")
        }
        err => tracing::error!(error = %err, "chat run failed"),
    }
}

/// Cancels the run once `max` elapses. Exits early if the token fires first.
fn spawn_deadline(cancellation: CancellationToken, max: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancellation.cancelled() => {}
            _ = tokio::time::sleep(max) => {
                tracing::warn!(max_secs = max.as_secs(), "chat run exceeded its time budget");
                cancellation.cancel();
            }
        }
    });
}
