use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use threadline::{PersistError, SessionError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MessageNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Session(SessionError::TokenLimitExceeded { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ApiError::Session(SessionError::Persistence(PersistError::MessageNotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Session(SessionError::Persistence(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Session(SessionError::Producer(_)) => StatusCode::BAD_GATEWAY,
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            ApiError::Session(SessionError::TokenLimitExceeded {
                model,
                prompt_tokens,
                context_tokens,
                requested_tokens,
                max_context_tokens,
            }) => json!({
                "model": model,
                "prompt_tokens": prompt_tokens,
                "context_tokens": context_tokens,
                "requested_tokens": requested_tokens,
                "max_context_tokens": max_context_tokens,
            }),
            other => json!(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match status {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::PAYLOAD_TOO_LARGE => "token_limit_exceeded",
            StatusCode::SERVICE_UNAVAILABLE => "persistence_unavailable",
            _ => "producer_error",
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }

        let body = json!({ "error": error, "details": self.details() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                ApiError::Session(SessionError::TokenLimitExceeded {
                    model: "gpt-4".into(),
                    prompt_tokens: 10,
                    context_tokens: 9000,
                    requested_tokens: 0,
                    max_context_tokens: 8192,
                }),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                ApiError::Session(SessionError::Persistence(PersistError::Unavailable {
                    backend: "mongodb",
                    attempts: 3,
                    message: "timeout".into(),
                })),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::Session(SessionError::Persistence(PersistError::MessageNotFound(
                    "m1".into(),
                ))),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Session(SessionError::Producer(threadline::ProducerError::other(
                    "boom",
                ))),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
