use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use census::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::mail::MailError;

/// Non-standard status the frontend reads as "reset session gone".
const SESSION_EXPIRED: u16 = 440;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Session expired!")]
    SessionExpired,

    #[error("Insufficient ETU history ({0} records).")]
    InsufficientHistory(usize),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn internal(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        AppError::InternalError(error.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::SessionExpired => {
                StatusCode::from_u16(SESSION_EXPIRED).unwrap_or(StatusCode::UNAUTHORIZED)
            }
            AppError::InsufficientHistory { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Mail { .. } => StatusCode::BAD_GATEWAY,
            AppError::Store { .. } | AppError::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            AppError::Mail(_) => {
                error!("{self}");
                "Mail delivery failed".to_string()
            }
            AppError::Store(_) | AppError::InternalError(_) => {
                error!("{self}");
                "Server Error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn render(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_client_errors_keep_message() {
        let (status, body) = render(AppError::bad_request("Invalid user role")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid user role");
    }

    #[tokio::test]
    async fn test_session_expired_status() {
        let (status, body) = render(AppError::SessionExpired).await;

        assert_eq!(status.as_u16(), 440);
        assert_eq!(body["message"], "Session expired!");
    }

    #[tokio::test]
    async fn test_store_errors_are_hidden() {
        let error = StoreError::Serialization(serde_json::from_str::<u32>("x").unwrap_err());
        let (status, body) = render(AppError::from(error)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Server Error");
    }

    #[tokio::test]
    async fn test_insufficient_history_message() {
        let (status, body) = render(AppError::InsufficientHistory(12)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Insufficient ETU history (12 records).");
    }
}
