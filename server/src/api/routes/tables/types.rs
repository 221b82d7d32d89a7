//! Tables API types

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::types::{default_rows_limit, validate_query_text, validate_rows_limit};
use crate::domain::table::{Column, SavedFilter};
use crate::domain::table::filters::Filter;

#[derive(Debug, Serialize)]
pub struct TableListResponse {
    pub tables: Vec<String>,
}

/// Request body carrying query text
#[derive(Debug, Deserialize, Validate)]
pub struct QueryTextRequest {
    #[validate(custom(function = "validate_query_text"))]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// `false` when there was no valid pending filter
    pub applied: bool,
    pub active_filter: Option<Filter>,
}

#[derive(Debug, Serialize)]
pub struct RecentQueriesResponse {
    pub queries: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RemoveRecentResponse {
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct SavedFiltersResponse {
    pub filters: Vec<SavedFilter>,
}

/// Save `text`, or the current query text when omitted
#[derive(Debug, Default, Deserialize, Validate)]
pub struct SaveFilterRequest {
    #[validate(custom(function = "validate_query_text"))]
    pub text: Option<String>,
}

/// Column visibility and/or position change
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateColumnRequest {
    pub hidden: Option<bool>,
    pub position: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ColumnsResponse {
    pub columns: Vec<Column>,
}

/// Row page selection
#[derive(Debug, Deserialize, Validate)]
pub struct RowsQuery {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_rows_limit")]
    #[validate(custom(function = "validate_rows_limit"))]
    pub limit: usize,
}
