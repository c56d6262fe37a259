use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use weathervane_core::WeathervaneError;

/// Failures reported before the response stream starts. Once streaming has
/// begun, errors travel as an error frame instead.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Upstream(#[from] WeathervaneError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBody(rejection) => rejection.status(),
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Upstream(WeathervaneError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidBody(_) | Self::InvalidRequest(_) => "invalid_request",
            Self::Upstream(err) if err.is_client_error() => "invalid_request",
            Self::Upstream(WeathervaneError::Cancelled) => "cancelled",
            Self::Upstream(_) => "upstream_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "chat request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "chat request rejected");
        }
        let body = json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
