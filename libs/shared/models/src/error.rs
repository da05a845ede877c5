use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Slot taken: {0}")]
    SlotTaken(String),

    #[error("No capacity: {0}")]
    NoCapacity(String),

    #[error("Already cancelled: {0}")]
    AlreadyCancelled(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl AppError {
    /// Tag clients match on in the `error.code` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "UNAUTHENTICATED",
            AppError::Forbidden(_) => "NOT_AUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::SlotTaken(_) => "SLOT_TAKEN",
            AppError::NoCapacity(_) => "NO_CAPACITY",
            AppError::AlreadyCancelled(_) => "ALREADY_CANCELLED",
            AppError::Internal(_) | AppError::Database(_) => "SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) | AppError::AlreadyCancelled(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::SlotTaken(_) | AppError::NoCapacity(_) => StatusCode::CONFLICT,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        // Storage and internal details stay in the log.
        let message = match &self {
            AppError::Internal(msg) | AppError::Database(msg) => {
                tracing::error!("Error: {}: {}", status, msg);
                "Something went wrong".to_string()
            }
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::ValidationError(msg)
            | AppError::Conflict(msg)
            | AppError::SlotTaken(msg)
            | AppError::NoCapacity(msg)
            | AppError::AlreadyCancelled(msg) => {
                tracing::warn!("Request rejected: {} {}: {}", status, code, msg);
                msg.clone()
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
