//! Shared API types
//!
//! Error responses share one JSON shape across every endpoint:
//! `{"error": <kind>, "code": <CODE>, "message": <text>}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use validator::ValidationError;

use crate::core::constants::{MAX_FETCH_ROWS, MAX_QUERY_LENGTH};
use crate::domain::table::{ErrorInfo, TableError};

/// Default page size for row fetches
pub const DEFAULT_ROWS_LIMIT: usize = 100;

/// Validator function for query text fields
pub fn validate_query_text<T: AsRef<str>>(text: T) -> Result<(), ValidationError> {
    if text.as_ref().len() > MAX_QUERY_LENGTH {
        return Err(ValidationError::new("text_too_long").with_message(
            format!("Query text must be at most {} bytes", MAX_QUERY_LENGTH).into(),
        ));
    }
    Ok(())
}

/// Validator function for row page sizes
pub fn validate_rows_limit<T: std::borrow::Borrow<usize>>(limit: T) -> Result<(), ValidationError> {
    let limit = *limit.borrow();
    if limit == 0 || limit > MAX_FETCH_ROWS {
        return Err(ValidationError::new("limit_range")
            .with_message(format!("Limit must be between 1 and {}", MAX_FETCH_ROWS).into()));
    }
    Ok(())
}

pub fn default_rows_limit() -> usize {
    DEFAULT_ROWS_LIMIT
}

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    /// A collaborator behind the server failed
    BadGateway { code: String, message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Row source failure, already classified for display
    pub fn from_error_info(info: ErrorInfo) -> Self {
        Self::BadGateway {
            code: "ROW_FETCH_FAILED".to_string(),
            message: format!("{}: {}", info.title, info.message),
        }
    }
}

impl From<TableError> for ApiError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::NotFound(_) => Self::not_found("TABLE_NOT_FOUND", e.to_string()),
            TableError::SavedFilterNotFound(_) => {
                Self::not_found("SAVED_FILTER_NOT_FOUND", e.to_string())
            }
            TableError::UnknownColumn(_) => Self::not_found("COLUMN_NOT_FOUND", e.to_string()),
            TableError::InvalidPosition { .. } => {
                Self::bad_request("INVALID_POSITION", e.to_string())
            }
            TableError::DuplicateColumn(_) => Self::bad_request("DUPLICATE_COLUMN", e.to_string()),
            TableError::AiDisabled => Self::conflict("AI_DISABLED", e.to_string()),
            TableError::Rows { .. } => {
                tracing::error!(error = %e, "Row source error");
                Self::internal("Failed to load table rows")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Conflict { code, message } => (StatusCode::CONFLICT, "conflict", code, message),
            Self::BadGateway { code, message } => {
                (StatusCode::BAD_GATEWAY, "bad_gateway", code, message)
            }
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}
