use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::Response;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::chunk::{new_message_id, AssistantStreamChunk, FinishReason};
use super::controller::{send, AssistantStreamController};

pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const DATA_STREAM_VERSION: &str = "v1";
pub const DATA_STREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Builds a streaming response whose body is written by `callback`.
///
/// The body opens with a start-step frame. When the callback returns `Ok`
/// the body closes with finish-step and finish-message frames; on `Err` it
/// closes with an error frame instead. `cancellation` fires as soon as the
/// body is dropped, which is how a client disconnect reaches the producer.
pub fn create_assistant_stream_response<F, Fut, E>(
    buffer: usize,
    cancellation: CancellationToken,
    callback: F,
) -> Response
where
    F: FnOnce(AssistantStreamController) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let controller = AssistantStreamController::new(tx.clone());
    let message_id = new_message_id();

    tokio::spawn(async move {
        if send(&tx, AssistantStreamChunk::StartStep { message_id })
            .await
            .is_err()
        {
            return;
        }

        let tail = match callback(controller).await {
            Ok(()) => vec![
                AssistantStreamChunk::FinishStep {
                    finish_reason: FinishReason::Stop,
                },
                AssistantStreamChunk::FinishMessage {
                    finish_reason: FinishReason::Stop,
                },
            ],
            Err(err) => vec![
                AssistantStreamChunk::Error(err.to_string()),
                AssistantStreamChunk::FinishMessage {
                    finish_reason: FinishReason::Error,
                },
            ],
        };

        for chunk in tail {
            if send(&tx, chunk).await.is_err() {
                break;
            }
        }
    });

    let guard = cancellation.drop_guard();
    let body = ReceiverStream::new(rx).map(move |chunk| {
        let _keep_alive = &guard;
        Ok::<_, Infallible>(Bytes::from(chunk.encode()))
    });

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(DATA_STREAM_CONTENT_TYPE),
    );
    headers.insert(DATA_STREAM_HEADER, HeaderValue::from_static(DATA_STREAM_VERSION));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}
