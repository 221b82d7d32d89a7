//! Application shell endpoint
//!
//! Pretty application paths reach this handler as `/?appId=<identifier>`
//! after the rewrite middleware; the shell echoes the resolved identifier so
//! the client can boot the right application.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use serde::Serialize;

use crate::domain::table::TableRegistry;

#[derive(Clone)]
pub struct ShellState {
    /// Query parameter carrying the identifier
    pub param: String,
    pub registry: Arc<TableRegistry>,
}

#[derive(Debug, Serialize)]
pub struct ShellResponse {
    pub app_id: Option<String>,
    pub tables: Vec<String>,
}

pub async fn shell(
    State(state): State<ShellState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<ShellResponse> {
    let app_id = params
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(&state.param))
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty());

    Json(ShellResponse {
        app_id,
        tables: state.registry.ids(),
    })
}
