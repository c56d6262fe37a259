use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use futures::stream::{self, StreamExt};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;
use weathervane_agent::Runner;
use weathervane_core::{LlmRequest, LlmStream, LlmStreamEvent, StreamingLlm, WeathervaneError};
use weathervane_server::{router, weather_agent, AppState, LlmSettings, ServerConfig};
use weathervane_tools::{lookup_weather, WeatherQuery};

type Turn = Vec<Result<LlmStreamEvent, WeathervaneError>>;

#[derive(Default)]
struct ScriptedLlm {
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<LlmRequest>>,
    hang_after_script: bool,
}

impl ScriptedLlm {
    fn new(turns: Vec<Turn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            ..Self::default()
        })
    }

    /// Never finishes its last turn, like a provider that stops sending.
    fn hanging(turns: Vec<Turn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            hang_after_script: true,
            ..Self::default()
        })
    }
}

impl StreamingLlm for ScriptedLlm {
    fn stream(&self, request: LlmRequest) -> LlmStream<'_> {
        self.requests.lock().unwrap().push(request);
        let turn = self.turns.lock().unwrap().pop_front().unwrap_or_default();
        if self.hang_after_script {
            stream::iter(turn).chain(stream::pending()).boxed()
        } else {
            stream::iter(turn).boxed()
        }
    }
}

fn app_with(llm: Arc<ScriptedLlm>, config: ServerConfig) -> axum::Router {
    let runner = Runner::new(llm).max_turns(config.max_turns);
    let state = AppState::new(runner, Arc::new(weather_agent().unwrap()), config);
    router(state)
}

fn app(llm: Arc<ScriptedLlm>) -> axum::Router {
    app_with(llm, ServerConfig::default())
}

fn chat_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn tokyo_question() -> String {
    json!({
        "messages": [{
            "role": "user",
            "content": [{"type": "text", "text": "What's the weather in Tokyo?"}]
        }]
    })
    .to_string()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn frames(body: &str) -> Vec<(char, Value)> {
    body.lines()
        .map(|line| {
            let (code, payload) = line.split_once(':').unwrap();
            (
                code.chars().next().unwrap(),
                serde_json::from_str(payload).unwrap(),
            )
        })
        .collect()
}

fn codes(frames: &[(char, Value)]) -> String {
    frames.iter().map(|(code, _)| *code).collect()
}

fn finished(reason: &str) -> Result<LlmStreamEvent, WeathervaneError> {
    Ok(LlmStreamEvent::Finished {
        finish_reason: Some(reason.to_string()),
    })
}

#[tokio::test]
async fn tokyo_question_streams_tool_call_result_and_answer() {
    let llm = ScriptedLlm::new(vec![
        vec![
            Ok(LlmStreamEvent::ToolCallStart {
                index: 0,
                id: "call_tokyo".to_string(),
                name: "get_weather".to_string(),
            }),
            Ok(LlmStreamEvent::ToolCallArgumentsDelta {
                index: 0,
                delta: "{\"city\":".to_string(),
            }),
            Ok(LlmStreamEvent::ToolCallArgumentsDelta {
                index: 0,
                delta: "\"Tokyo\"}".to_string(),
            }),
            finished("tool_calls"),
        ],
        vec![
            Ok(LlmStreamEvent::TextDelta("Tokyo is ".to_string())),
            Ok(LlmStreamEvent::TextDelta("14-20°C and partly cloudy.".to_string())),
            finished("stop"),
        ],
    ]);

    let response = app(llm.clone())
        .oneshot(chat_request(tokyo_question()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-vercel-ai-data-stream"], "v1");
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );

    let frames = frames(&body_text(response).await);
    assert_eq!(codes(&frames), "fbc9aef00ed");

    assert_eq!(frames[1].1["toolName"], "get_weather");
    assert_eq!(frames[1].1["toolCallId"], "call_tokyo");
    assert_eq!(frames[2].1["argsTextDelta"], "{\"city\":\"Tokyo\"}");
    assert_eq!(frames[3].1["args"], json!({"city": "Tokyo"}));

    let expected = serde_json::to_value(lookup_weather(&WeatherQuery::new("Tokyo"))).unwrap();
    assert_eq!(frames[4].1["toolCallId"], "call_tokyo");
    assert_eq!(frames[4].1["result"], expected);
    assert_eq!(frames[4].1["result"]["temperatureRange"], "14-20°C");

    assert_eq!(frames[5].1["finishReason"], "tool-calls");
    assert_ne!(frames[6].1["messageId"], frames[0].1["messageId"]);
    assert_eq!(frames[7].1, "Tokyo is ");
    assert_eq!(frames[8].1, "14-20°C and partly cloudy.");
    assert_eq!(frames[9].1["finishReason"], "stop");
    assert_eq!(frames[10].1["finishReason"], "stop");

    let requests = llm.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "get_weather");
}

#[tokio::test]
async fn model_failure_after_stream_start_becomes_error_frame() {
    let llm = ScriptedLlm::new(vec![vec![Err(WeathervaneError::LlmProvider(
        "503: overloaded".to_string(),
    ))]]);

    let response = app(llm).oneshot(chat_request(tokyo_question())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let frames = frames(&body_text(response).await);
    assert_eq!(codes(&frames), "f3d");
    assert!(frames[1].1.as_str().unwrap().contains("503: overloaded"));
    assert_eq!(frames[2].1["finishReason"], "error");
}

#[tokio::test]
async fn stalled_model_is_cut_off_at_the_time_budget() {
    let llm = ScriptedLlm::hanging(vec![vec![Ok(LlmStreamEvent::TextDelta(
        "Checking".to_string(),
    ))]]);
    let config = ServerConfig {
        max_duration: Duration::from_millis(100),
        ..ServerConfig::default()
    };

    let response = tokio::time::timeout(Duration::from_secs(5), async {
        let response = app_with(llm, config)
            .oneshot(chat_request(tokyo_question()))
            .await
            .unwrap();
        body_text(response).await
    })
    .await
    .expect("deadline should end the stream");

    let frames = frames(&response);
    assert_eq!(codes(&frames), "f03d");
    assert_eq!(frames[1].1, "Checking");
    assert_eq!(frames[2].1, "Operation was cancelled");
    assert_eq!(frames[3].1["finishReason"], "error");
}

#[tokio::test]
async fn malformed_json_is_rejected_before_streaming() {
    let response = app(ScriptedLlm::new(vec![]))
        .oneshot(chat_request("{\"messages\": ["))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"]["type"], "invalid_request");
}

#[tokio::test]
async fn unknown_role_is_rejected() {
    let body = json!({"messages": [{"role": "robot", "content": "beep"}]}).to_string();
    let response = app(ScriptedLlm::new(vec![]))
        .oneshot(chat_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn empty_messages_are_rejected_without_calling_the_model() {
    let llm = ScriptedLlm::new(vec![]);
    let response = app(llm.clone())
        .oneshot(chat_request(json!({"messages": []}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"]["message"], "messages must not be empty");
    assert!(llm.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_content_type_is_rejected() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .body(Body::from(tokyo_question()))
        .unwrap();
    let response = app(ScriptedLlm::new(vec![])).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let config = ServerConfig {
        body_limit: 32,
        ..ServerConfig::default()
    };
    let response = app_with(ScriptedLlm::new(vec![]), config)
        .oneshot(chat_request(tokyo_question()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn health_reports_ok() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app(ScriptedLlm::new(vec![])).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn from_settings_streams_through_openai_compatible_backend() {
    let server = MockServer::start();
    let sse = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Sunny\"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n"
    );
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer test-key")
            .json_body_partial(r#"{"model":"gpt-4o-mini","stream":true}"#);
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(sse);
    });

    let state = AppState::from_settings(
        ServerConfig::default(),
        LlmSettings {
            base_url: server.base_url(),
            api_key: SecretString::new("test-key".to_string()),
            model: "gpt-4o-mini".to_string(),
        },
    )
    .unwrap();

    let response = router(state)
        .oneshot(chat_request(tokyo_question()))
        .await
        .unwrap();
    let frames = frames(&body_text(response).await);

    assert_eq!(codes(&frames), "f0ed");
    assert_eq!(frames[1].1, "Sunny");
    mock.assert();
}
