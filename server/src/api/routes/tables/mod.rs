//! Tables API endpoints
//!
//! Every route is scoped to one mounted table and delegates to its
//! [`TableController`](crate::domain::table::TableController).

pub mod types;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};

use types::{
    ColumnsResponse, QueryTextRequest, RecentQueriesResponse, RemoveRecentResponse, RowsQuery,
    SaveFilterRequest, SavedFiltersResponse, SubmitResponse, TableListResponse,
    UpdateColumnRequest,
};

use crate::api::extractors::{
    ColumnPath, ErrorSlotPath, SavedFilterPath, TablePath, ValidatedJson, ValidatedQuery,
};
use crate::api::types::ApiError;
use crate::domain::table::{ResolveOutcome, Rows, SavedFilter, TableRegistry, TableSnapshot};

/// Shared state for Tables API endpoints
#[derive(Clone)]
pub struct TablesApiState {
    pub registry: Arc<TableRegistry>,
}

/// Build Tables API routes
pub fn routes(registry: Arc<TableRegistry>) -> Router<()> {
    let state = TablesApiState { registry };

    Router::new()
        .route("/", get(list_tables))
        .route("/{table}", get(get_table))
        // Query editor
        .route("/{table}/query", put(set_query))
        .route("/{table}/query/submit", post(submit_query))
        .route("/{table}/query/resolve", post(resolve_query))
        .route("/{table}/errors/{slot}", delete(clear_error))
        // Recent queries
        .route(
            "/{table}/recent",
            get(list_recent).post(add_recent).delete(clear_recent),
        )
        .route("/{table}/recent/item", delete(remove_recent))
        // Saved filters
        .route("/{table}/saved", get(list_saved).post(save_filter))
        .route("/{table}/saved/{id}", delete(delete_saved))
        .route("/{table}/saved/{id}/load", post(load_saved))
        // Grid
        .route("/{table}/columns/{name}", patch(update_column))
        .route("/{table}/rows", get(fetch_rows))
        .with_state(state)
}

pub async fn list_tables(State(state): State<TablesApiState>) -> Json<TableListResponse> {
    Json(TableListResponse {
        tables: state.registry.ids(),
    })
}

pub async fn get_table(
    State(state): State<TablesApiState>,
    path: TablePath,
) -> Result<Json<TableSnapshot>, ApiError> {
    let table = state.registry.get(&path.table)?;
    Ok(Json(table.snapshot()))
}

/// Replace the query text; the response carries the new status and parse errors
pub async fn set_query(
    State(state): State<TablesApiState>,
    path: TablePath,
    ValidatedJson(body): ValidatedJson<QueryTextRequest>,
) -> Result<Json<TableSnapshot>, ApiError> {
    let table = state.registry.get(&path.table)?;
    table.set_query(&body.text);
    Ok(Json(table.snapshot()))
}

pub async fn submit_query(
    State(state): State<TablesApiState>,
    path: TablePath,
) -> Result<Json<SubmitResponse>, ApiError> {
    let table = state.registry.get(&path.table)?;
    let applied = table.submit();
    Ok(Json(SubmitResponse {
        applied,
        active_filter: table.snapshot().active_filter,
    }))
}

/// Ask the correction service to repair the current (invalid) query
pub async fn resolve_query(
    State(state): State<TablesApiState>,
    path: TablePath,
) -> Result<Json<ResolveOutcome>, ApiError> {
    let table = state.registry.get(&path.table)?;
    let outcome = table.resolve_invalid_query().await?;
    Ok(Json(outcome))
}

pub async fn clear_error(
    State(state): State<TablesApiState>,
    path: ErrorSlotPath,
) -> Result<StatusCode, ApiError> {
    let table = state.registry.get(&path.table)?;
    table.clear_error(path.slot);
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Recent queries
// =============================================================================

pub async fn list_recent(
    State(state): State<TablesApiState>,
    path: TablePath,
) -> Result<Json<RecentQueriesResponse>, ApiError> {
    let table = state.registry.get(&path.table)?;
    Ok(Json(RecentQueriesResponse {
        queries: table.recent_queries(),
    }))
}

pub async fn add_recent(
    State(state): State<TablesApiState>,
    path: TablePath,
    ValidatedJson(body): ValidatedJson<QueryTextRequest>,
) -> Result<Json<RecentQueriesResponse>, ApiError> {
    let table = state.registry.get(&path.table)?;
    table.add_recent_query(&body.text);
    Ok(Json(RecentQueriesResponse {
        queries: table.recent_queries(),
    }))
}

pub async fn remove_recent(
    State(state): State<TablesApiState>,
    path: TablePath,
    ValidatedJson(body): ValidatedJson<QueryTextRequest>,
) -> Result<Json<RemoveRecentResponse>, ApiError> {
    let table = state.registry.get(&path.table)?;
    Ok(Json(RemoveRecentResponse {
        removed: table.remove_recent_query(&body.text),
    }))
}

pub async fn clear_recent(
    State(state): State<TablesApiState>,
    path: TablePath,
) -> Result<StatusCode, ApiError> {
    let table = state.registry.get(&path.table)?;
    table.clear_recent_queries();
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Saved filters
// =============================================================================

pub async fn list_saved(
    State(state): State<TablesApiState>,
    path: TablePath,
) -> Result<Json<SavedFiltersResponse>, ApiError> {
    let table = state.registry.get(&path.table)?;
    Ok(Json(SavedFiltersResponse {
        filters: table.saved_filters(),
    }))
}

/// Save a filter; 409 when the text is blank or already saved
pub async fn save_filter(
    State(state): State<TablesApiState>,
    path: TablePath,
    ValidatedJson(body): ValidatedJson<SaveFilterRequest>,
) -> Result<(StatusCode, Json<SavedFilter>), ApiError> {
    let table = state.registry.get(&path.table)?;
    let saved = table.save_filter(body.text.as_deref()).ok_or_else(|| {
        ApiError::conflict(
            "FILTER_NOT_SAVED",
            "Query text is empty or already saved",
        )
    })?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn delete_saved(
    State(state): State<TablesApiState>,
    path: SavedFilterPath,
) -> Result<StatusCode, ApiError> {
    let table = state.registry.get(&path.table)?;
    if !table.delete_filter(&path.id) {
        return Err(ApiError::not_found(
            "SAVED_FILTER_NOT_FOUND",
            format!("Saved filter not found: {}", path.id),
        ));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Load a saved filter into the editor; it becomes active once it parses
pub async fn load_saved(
    State(state): State<TablesApiState>,
    path: SavedFilterPath,
) -> Result<Json<TableSnapshot>, ApiError> {
    let table = state.registry.get(&path.table)?;
    table.load_filter(&path.id)?;
    Ok(Json(table.snapshot()))
}

// =============================================================================
// Grid
// =============================================================================

pub async fn update_column(
    State(state): State<TablesApiState>,
    path: ColumnPath,
    ValidatedJson(body): ValidatedJson<UpdateColumnRequest>,
) -> Result<Json<ColumnsResponse>, ApiError> {
    if body.hidden.is_none() && body.position.is_none() {
        return Err(ApiError::bad_request(
            "EMPTY_UPDATE",
            "Provide at least one of: hidden, position",
        ));
    }

    let table = state.registry.get(&path.table)?;
    if let Some(hidden) = body.hidden {
        table.set_column_hidden(&path.name, hidden)?;
    }
    if let Some(position) = body.position {
        table.move_column(&path.name, position)?;
    }
    Ok(Json(ColumnsResponse {
        columns: table.snapshot().columns,
    }))
}

/// Fetch a page of rows with the active filter
pub async fn fetch_rows(
    State(state): State<TablesApiState>,
    path: TablePath,
    ValidatedQuery(query): ValidatedQuery<RowsQuery>,
) -> Result<Json<Rows>, ApiError> {
    let table = state.registry.get(&path.table)?;
    let rows = table
        .fetch_rows(query.offset, query.limit)
        .await
        .map_err(ApiError::from_error_info)?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::data::persist::MemoryStore;
    use crate::domain::table::{
        Column, ColumnDef, ColumnType, CorrectionService, MemoryRowSource, ServiceError,
        TableController, TableServices,
    };

    #[derive(Debug)]
    struct FixedCorrection(Result<String, ServiceError>);

    #[async_trait]
    impl CorrectionService for FixedCorrection {
        async fn correct(&self, _query: &str, _columns: &[Column]) -> Result<String, ServiceError> {
            self.0.clone()
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn router(correction: Option<Arc<dyn CorrectionService>>) -> Router {
        let rows = serde_json::from_value(json!([
            {"id": 1, "status": "open", "amount": 40},
            {"id": 2, "status": "closed", "amount": 250},
            {"id": 3, "status": "open", "amount": 900}
        ]))
        .unwrap();
        let services = TableServices {
            store: Arc::new(MemoryStore::new()),
            correction,
            rows: Arc::new(MemoryRowSource::new(rows)),
            max_recent_queries: 5,
        };
        let table = TableController::mount(
            "orders",
            vec![
                ColumnDef::new("id", ColumnType::Number),
                ColumnDef::new("status", ColumnType::String),
                ColumnDef::new("amount", ColumnType::Number),
            ],
            services,
        )
        .unwrap();
        let mut registry = TableRegistry::new();
        registry.insert(table);
        routes(Arc::new(registry))
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_list_and_get_tables() {
        let router = router(None);
        let (status, body) = send(&router, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tables"], json!(["orders"]));

        let (status, body) = send(&router, Method::GET, "/orders", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "waiting");
        assert_eq!(body["columns"].as_array().unwrap().len(), 3);

        let (status, body) = send(&router, Method::GET, "/customers", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "TABLE_NOT_FOUND");

        let (status, body) = send(&router, Method::GET, "/bad.id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_TABLE_ID");
    }

    #[tokio::test]
    async fn test_query_submit_and_rows() {
        let router = router(None);
        let (status, body) = send(
            &router,
            Method::PUT,
            "/orders/query",
            Some(json!({"text": "status = open and amount > 100"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "query");
        assert!(body["pending_filter"].is_object());
        assert!(body["active_filter"].is_null());

        let (_, body) = send(&router, Method::POST, "/orders/query/submit", None).await;
        assert_eq!(body["applied"], true);
        assert!(body["active_filter"].is_object());

        let (status, body) = send(&router, Method::GET, "/orders/rows?limit=10", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["rows"][0]["id"], 3);

        let (_, body) = send(&router, Method::GET, "/orders/recent", None).await;
        assert_eq!(body["queries"], json!(["status = open and amount > 100"]));
    }

    #[tokio::test]
    async fn test_invalid_query_without_ai() {
        let router = router(None);
        let (_, body) = send(
            &router,
            Method::PUT,
            "/orders/query",
            Some(json!({"text": "colour = red"})),
        )
        .await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["parse_errors"][0]["kind"], "unknown_column");

        let (status, body) = send(&router, Method::POST, "/orders/query/resolve", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "AI_DISABLED");

        let (_, body) = send(&router, Method::POST, "/orders/query/submit", None).await;
        assert_eq!(body["applied"], false);
    }

    #[tokio::test]
    async fn test_resolve_with_correction() {
        let correction: Arc<dyn CorrectionService> =
            Arc::new(FixedCorrection(Ok("amount >= 250".to_string())));
        let router = router(Some(correction));

        let (_, body) = send(
            &router,
            Method::PUT,
            "/orders/query",
            Some(json!({"text": "big orders"})),
        )
        .await;
        assert_eq!(body["status"], "ai");

        let (status, body) = send(&router, Method::POST, "/orders/query/resolve", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "resolved");
        assert_eq!(body["query"], "amount >= 250");

        let (_, body) = send(&router, Method::GET, "/orders/rows", None).await;
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn test_resolve_failure_fills_slot_and_clears() {
        let correction: Arc<dyn CorrectionService> = Arc::new(FixedCorrection(Err(
            ServiceError::Network("connection refused".to_string()),
        )));
        let router = router(Some(correction));
        send(
            &router,
            Method::PUT,
            "/orders/query",
            Some(json!({"text": "big orders"})),
        )
        .await;

        let (_, body) = send(&router, Method::POST, "/orders/query/resolve", None).await;
        assert_eq!(body["outcome"], "failed");
        assert_eq!(body["error"]["title"], "Network Error");

        let (_, body) = send(&router, Method::GET, "/orders", None).await;
        assert_eq!(body["filter_parsing_error"]["title"], "Network Error");
        assert_eq!(body["query"], "big orders");

        let (status, _) = send(
            &router,
            Method::DELETE,
            "/orders/errors/filter_parsing",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = send(&router, Method::GET, "/orders", None).await;
        assert!(body["filter_parsing_error"].is_null());

        let (status, body) = send(&router, Method::DELETE, "/orders/errors/other", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_ERROR_SLOT");
    }

    #[tokio::test]
    async fn test_recent_queries_endpoints() {
        let router = router(None);
        for text in ["status = open", "amount > 5", "  status = open  "] {
            send(
                &router,
                Method::POST,
                "/orders/recent",
                Some(json!({ "text": text })),
            )
            .await;
        }
        let (_, body) = send(&router, Method::GET, "/orders/recent", None).await;
        assert_eq!(body["queries"], json!(["status = open", "amount > 5"]));

        let (_, body) = send(
            &router,
            Method::DELETE,
            "/orders/recent/item",
            Some(json!({"text": "amount > 5"})),
        )
        .await;
        assert_eq!(body["removed"], true);

        let (status, _) = send(&router, Method::DELETE, "/orders/recent", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = send(&router, Method::GET, "/orders/recent", None).await;
        assert_eq!(body["queries"], json!([]));
    }

    #[tokio::test]
    async fn test_saved_filters_endpoints() {
        let router = router(None);
        let (status, saved) = send(
            &router,
            Method::POST,
            "/orders/saved",
            Some(json!({"text": "status = closed"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = saved["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &router,
            Method::POST,
            "/orders/saved",
            Some(json!({"text": " status = closed "})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "FILTER_NOT_SAVED");

        let (_, body) = send(&router, Method::GET, "/orders/saved", None).await;
        assert_eq!(body["filters"].as_array().unwrap().len(), 1);

        let (status, body) = send(
            &router,
            Method::POST,
            &format!("/orders/saved/{}/load", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "status = closed");
        assert!(body["active_filter"].is_object());

        let uri = format!("/orders/saved/{}", id);
        let (status, _) = send(&router, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&router, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&router, Method::POST, "/orders/saved/nope/load", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "SAVED_FILTER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_save_current_query_text() {
        let router = router(None);
        send(
            &router,
            Method::PUT,
            "/orders/query",
            Some(json!({"text": "amount < 50"})),
        )
        .await;
        let (status, saved) = send(&router, Method::POST, "/orders/saved", Some(json!({}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(saved["query"], "amount < 50");
    }

    #[tokio::test]
    async fn test_update_column() {
        let router = router(None);
        let (status, body) = send(
            &router,
            Method::PATCH,
            "/orders/columns/amount",
            Some(json!({"hidden": true, "position": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let columns = body["columns"].as_array().unwrap();
        let amount = columns.iter().find(|c| c["name"] == "amount").unwrap();
        assert_eq!(amount["hidden"], true);
        assert_eq!(amount["position"], 0);

        let (_, body) = send(&router, Method::GET, "/orders/rows", None).await;
        assert!(body["rows"][0].get("amount").is_none());

        let (status, body) = send(
            &router,
            Method::PATCH,
            "/orders/columns/amount",
            Some(json!({"position": 7})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_POSITION");

        let (status, _) = send(
            &router,
            Method::PATCH,
            "/orders/columns/colour",
            Some(json!({"hidden": true})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&router, Method::PATCH, "/orders/columns/id", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "EMPTY_UPDATE");
    }

    #[tokio::test]
    async fn test_validation_rejections() {
        let router = router(None);
        let (status, body) = send(&router, Method::GET, "/orders/rows?limit=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let long = "x".repeat(crate::core::constants::MAX_QUERY_LENGTH + 1);
        let (status, body) = send(
            &router,
            Method::PUT,
            "/orders/query",
            Some(json!({ "text": long })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = send(&router, Method::PUT, "/orders/query", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "JSON_PARSE_ERROR");
    }
}
