use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::StoreError;

/// Failure of a messaging-core operation.
///
/// Everything except `StorageFailure` is user-facing and reported only to
/// the initiator. Offline recipients are not errors.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("user {0:?} not found")]
    RecipientNotFound(String),

    #[error("not a member of room {0:?}")]
    NotMember(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl ChatError {
    /// Text for the `notification` event sent back to the initiator.
    pub fn notification_text(&self) -> String {
        match self {
            ChatError::Unauthorized(_) => "Unauthorized".to_string(),
            ChatError::RecipientNotFound(_) => "User not found".to_string(),
            ChatError::NotMember(room) => format!("You are not a member of {room}"),
            ChatError::InvalidRequest(reason) => reason.clone(),
            ChatError::StorageFailure(_) => "Something went wrong, please try again".to_string(),
        }
    }
}

/// Structured API error returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<Vec<FieldError>>,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            details: Some(details),
            ..Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Validation failed")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Unauthorized(reason) => Self::unauthorized(reason),
            ChatError::RecipientNotFound(_) => Self::not_found("User not found"),
            ChatError::NotMember(room) => Self::forbidden(format!("Not a member of {room}")),
            ChatError::InvalidRequest(reason) => Self::bad_request(reason),
            ChatError::StorageFailure(err) => err.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(?err, "storage error");
        Self::internal("An internal error occurred")
    }
}
