//! Path and validation extractors for API routes

use std::ops::Deref;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::domain::table::ErrorSlot;

/// Maximum length for saved filter ids and column names in paths
pub const MAX_ID_LENGTH: usize = 256;

/// Validate table id: 1-64 chars, alphanumeric + dash/underscore
pub fn is_valid_table_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validate generic ID length (saved filter id, column name)
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_LENGTH
}

#[derive(Debug, Deserialize)]
struct TablePathRaw {
    table: String,
}

/// Validated `{table}` path segment
#[derive(Debug)]
pub struct TablePath {
    pub table: String,
}

impl<S> FromRequestParts<S> for TablePath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<TablePathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_table_id(&raw.table) {
            return Err(ValidationRejection::InvalidTableId);
        }

        Ok(Self { table: raw.table })
    }
}

// ============================================================================
// Compound Path Extractors
// ============================================================================

#[derive(Debug, Deserialize)]
struct SavedFilterPathRaw {
    table: String,
    id: String,
}

/// Validated `{table}/saved/{id}` path
#[derive(Debug)]
pub struct SavedFilterPath {
    pub table: String,
    pub id: String,
}

impl<S> FromRequestParts<S> for SavedFilterPath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<SavedFilterPathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_table_id(&raw.table) {
            return Err(ValidationRejection::InvalidTableId);
        }
        if !is_valid_id(&raw.id) {
            return Err(ValidationRejection::InvalidFilterId);
        }

        Ok(Self {
            table: raw.table,
            id: raw.id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ColumnPathRaw {
    table: String,
    name: String,
}

/// Validated `{table}/columns/{name}` path
#[derive(Debug)]
pub struct ColumnPath {
    pub table: String,
    pub name: String,
}

impl<S> FromRequestParts<S> for ColumnPath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<ColumnPathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_table_id(&raw.table) {
            return Err(ValidationRejection::InvalidTableId);
        }
        if !is_valid_id(&raw.name) {
            return Err(ValidationRejection::InvalidColumnName);
        }

        Ok(Self {
            table: raw.table,
            name: raw.name,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorSlotPathRaw {
    table: String,
    slot: String,
}

/// Validated `{table}/errors/{slot}` path
#[derive(Debug)]
pub struct ErrorSlotPath {
    pub table: String,
    pub slot: ErrorSlot,
}

impl<S> FromRequestParts<S> for ErrorSlotPath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<ErrorSlotPathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_table_id(&raw.table) {
            return Err(ValidationRejection::InvalidTableId);
        }
        let slot = match raw.slot.as_str() {
            "query" => ErrorSlot::Query,
            "filter_parsing" => ErrorSlot::FilterParsing,
            _ => return Err(ValidationRejection::InvalidErrorSlot),
        };

        Ok(Self {
            table: raw.table,
            slot,
        })
    }
}

/// Validation rejection with structured error response
pub enum ValidationRejection {
    /// Failed to parse path parameters
    Path(PathRejection),
    InvalidTableId,
    InvalidFilterId,
    InvalidColumnName,
    InvalidErrorSlot,
    /// Failed to parse query string
    Query(QueryRejection),
    /// Failed to parse JSON body
    Json(JsonRejection),
    /// Validation constraints not satisfied
    Validation(validator::ValidationErrors),
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Path(rejection) => (
                StatusCode::BAD_REQUEST,
                "PATH_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::InvalidTableId => (
                StatusCode::BAD_REQUEST,
                "INVALID_TABLE_ID",
                "Invalid table: must be 1-64 alphanumeric chars, dashes, or underscores"
                    .to_string(),
            ),
            Self::InvalidFilterId => (
                StatusCode::BAD_REQUEST,
                "INVALID_FILTER_ID",
                format!("Invalid saved filter id: must be 1-{} characters", MAX_ID_LENGTH),
            ),
            Self::InvalidColumnName => (
                StatusCode::BAD_REQUEST,
                "INVALID_COLUMN_NAME",
                format!("Invalid column name: must be 1-{} characters", MAX_ID_LENGTH),
            ),
            Self::InvalidErrorSlot => (
                StatusCode::BAD_REQUEST,
                "INVALID_ERROR_SLOT",
                "Error slot must be one of: query, filter_parsing".to_string(),
            ),
            Self::Query(rejection) => (
                StatusCode::BAD_REQUEST,
                "QUERY_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::Json(rejection) => (
                StatusCode::BAD_REQUEST,
                "JSON_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format_validation_errors(&errors),
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": "bad_request",
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: validation failed", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Query extractor with automatic validation
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<T> Deref for ValidatedQuery<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Query)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}

/// JSON body extractor with automatic validation
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T> Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidationRejection::Json)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_table_ids() {
        assert!(is_valid_table_id("orders"));
        assert!(is_valid_table_id("order_items-2024"));
        assert!(is_valid_table_id(&"a".repeat(64)));
    }

    #[test]
    fn test_invalid_table_ids() {
        assert!(!is_valid_table_id(""));
        assert!(!is_valid_table_id(&"a".repeat(65)));
        assert!(!is_valid_table_id("orders.json"));
        assert!(!is_valid_table_id("ord ers"));
        assert!(!is_valid_table_id("tablé"));
    }

    #[test]
    fn test_id_length() {
        assert!(is_valid_id("3f1c"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id(&"x".repeat(MAX_ID_LENGTH + 1)));
    }
}
