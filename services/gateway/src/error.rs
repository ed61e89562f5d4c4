use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nest_protocol::{error_codes, HttpErrorEnvelope};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("device is not authorized; complete pairing first")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("too many concurrent subscriptions for this device")]
    TooManySubscriptions,
    #[error("timed out waiting for a bucket update")]
    SubscribeTimeout,
    #[error("weather service unavailable")]
    UpstreamUnavailable,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, error_codes::BAD_REQUEST),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, error_codes::UNAUTHORIZED),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
            AppError::Conflict(_) => (StatusCode::CONFLICT, error_codes::CONFLICT),
            AppError::TooManySubscriptions => (
                StatusCode::BAD_REQUEST,
                error_codes::TOO_MANY_SUBSCRIPTIONS,
            ),
            AppError::SubscribeTimeout => {
                (StatusCode::GATEWAY_TIMEOUT, error_codes::GATEWAY_TIMEOUT)
            }
            AppError::UpstreamUnavailable => {
                (StatusCode::BAD_GATEWAY, error_codes::BAD_GATEWAY)
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_codes::INTERNAL_ERROR,
                )
            }
        };

        let message = match &self {
            // Never leak sqlx internals to clients.
            AppError::Database(_) => "internal error".to_owned(),
            other => other.to_string(),
        };

        (
            status,
            Json(HttpErrorEnvelope {
                code: code.to_owned(),
                message,
                details: None,
            }),
        )
            .into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
