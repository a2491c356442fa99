//! Error types for the signing API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use signing_session::ResponseError;

#[derive(Debug, Error)]
pub enum ApiError {
    // One message for missing and unknown tokens; the two cases must be
    // indistinguishable to a caller probing for valid links.
    #[error("This signing link is not valid")]
    InvalidToken,

    #[error("This signing link has expired")]
    TokenExpired,

    #[error("This signing link has already been used")]
    TokenUsed,

    #[error("Document not found")]
    DocumentNotFound,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    InvalidResponses(#[from] ResponseError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::TokenExpired => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::TokenUsed => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::DocumentNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::InvalidResponses(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
