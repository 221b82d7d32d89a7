//! Table state controller
//!
//! Owns everything the query editor and grid of one table mount need: the
//! column set, the query text and its parse status, the pending and active
//! filters, both error slots, recent queries and saved filters.
//!
//! State sits behind a `parking_lot::Mutex` that is never held across an
//! `.await`. Network calls (query correction, row fetch) snapshot what they
//! need, release the lock, and re-acquire it to commit.
//!
//! Status transitions on every query text change:
//!
//! | Text                         | Status    | Pending filter | Active filter |
//! |------------------------------|-----------|----------------|---------------|
//! | blank                        | `waiting` | cleared        | cleared       |
//! | valid                        | `query`   | parsed tree    | unchanged     |
//! | invalid, correction enabled  | `ai`      | cleared        | unchanged     |
//! | invalid, correction disabled | `error`   | cleared        | unchanged     |

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::classify::{ErrorInfo, ErrorSource, classify};
use super::columns::{Column, ColumnDef, ColumnLayout, ColumnSet};
use super::correction::CorrectionService;
use super::error::TableError;
use super::filters::{Filter, QueryError, parse_query};
use super::queries::{RecentQueries, SavedFilter, SavedFilters};
use super::rows::{FetchRequest, RowSource, Rows};
use crate::core::constants::KEY_COLUMN_LAYOUT;
use crate::data::persist::{KeyValueStore, load_or_default, state_key, store_json};

/// Query editor status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// No query text
    Waiting,
    /// Invalid text, correction available
    Ai,
    /// Valid text
    Query,
    /// Invalid text, no correction available
    Error,
}

/// Independently clearable error slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSlot {
    /// Row fetch failures
    Query,
    /// Query correction failures
    FilterParsing,
}

/// Result of an invalid-query resolution attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveOutcome {
    /// Corrected text parsed and is now the active filter
    Resolved { query: String },
    /// Service answered but its text still does not parse
    Unresolved {
        query: String,
        errors: Vec<QueryError>,
    },
    /// Another resolution is in flight; this call did nothing
    AlreadyPending,
    /// Service call failed; the error is in the filter parsing slot
    Failed { error: ErrorInfo },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolutionState {
    Idle,
    Pending,
}

/// Collaborators shared by every table
#[derive(Debug, Clone)]
pub struct TableServices {
    pub store: Arc<dyn KeyValueStore>,
    /// `None` disables AI-assisted correction
    pub correction: Option<Arc<dyn CorrectionService>>,
    pub rows: Arc<dyn RowSource>,
    pub max_recent_queries: usize,
}

/// Point-in-time view of a table, as served to the editor
#[derive(Debug, Clone, Serialize)]
pub struct TableSnapshot {
    pub id: String,
    pub columns: Vec<Column>,
    pub query: String,
    pub status: QueryStatus,
    pub ai_enabled: bool,
    pub resolving: bool,
    pub pending_filter: Option<Filter>,
    pub active_filter: Option<Filter>,
    pub parse_errors: Vec<QueryError>,
    pub query_error: Option<ErrorInfo>,
    pub filter_parsing_error: Option<ErrorInfo>,
}

#[derive(Debug)]
struct TableState {
    columns: ColumnSet,
    query_text: String,
    status: QueryStatus,
    parse_errors: Vec<QueryError>,
    pending_filter: Option<Filter>,
    active_filter: Option<Filter>,
    /// Apply the next valid parse as if submitted
    auto_apply: bool,
    resolution: ResolutionState,
    query_error: Option<ErrorInfo>,
    filter_parsing_error: Option<ErrorInfo>,
    recent: RecentQueries,
    saved: SavedFilters,
}

#[derive(Debug)]
pub struct TableController {
    id: String,
    layout_key: String,
    services: TableServices,
    state: Mutex<TableState>,
}

/// Returns the resolution slot to idle when the resolving future finishes or is dropped
struct ResolutionGuard<'a> {
    state: &'a Mutex<TableState>,
}

impl Drop for ResolutionGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().resolution = ResolutionState::Idle;
    }
}

impl TableController {
    /// Mount a table: build its columns and restore persisted state
    pub fn mount(
        id: impl Into<String>,
        defs: Vec<ColumnDef>,
        services: TableServices,
    ) -> Result<Self, TableError> {
        let id = id.into();
        let mut columns = ColumnSet::new(defs)?;

        let layout_key = state_key(&id, KEY_COLUMN_LAYOUT);
        let layout: ColumnLayout = load_or_default(services.store.as_ref(), &layout_key);
        if layout != ColumnLayout::default() {
            columns.apply_layout(&layout);
            tracing::debug!(table = %id, "Restored column layout");
        }

        let recent = RecentQueries::load(
            services.store.clone(),
            &id,
            services.max_recent_queries,
        );
        let saved = SavedFilters::load(services.store.clone(), &id);

        tracing::debug!(
            table = %id,
            columns = columns.columns().len(),
            ai_enabled = services.correction.is_some(),
            "Table mounted"
        );

        Ok(Self {
            id,
            layout_key,
            services,
            state: Mutex::new(TableState {
                columns,
                query_text: String::new(),
                status: QueryStatus::Waiting,
                parse_errors: Vec::new(),
                pending_filter: None,
                active_filter: None,
                auto_apply: false,
                resolution: ResolutionState::Idle,
                query_error: None,
                filter_parsing_error: None,
                recent,
                saved,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ai_enabled(&self) -> bool {
        self.services.correction.is_some()
    }

    pub fn snapshot(&self) -> TableSnapshot {
        let state = self.state.lock();
        TableSnapshot {
            id: self.id.clone(),
            columns: state.columns.columns().to_vec(),
            query: state.query_text.clone(),
            status: state.status,
            ai_enabled: self.ai_enabled(),
            resolving: state.resolution == ResolutionState::Pending,
            pending_filter: state.pending_filter.clone(),
            active_filter: state.active_filter.clone(),
            parse_errors: state.parse_errors.clone(),
            query_error: state.query_error.clone(),
            filter_parsing_error: state.filter_parsing_error.clone(),
        }
    }

    // =========================================================================
    // Query editor
    // =========================================================================

    /// Replace the query text and re-parse it
    pub fn set_query(&self, text: &str) -> QueryStatus {
        let mut state = self.state.lock();
        state.query_text = text.to_string();
        self.reparse(&mut state);
        state.status
    }

    /// Make the pending filter active and record the query text
    ///
    /// Returns `false` when there is nothing valid to apply.
    pub fn submit(&self) -> bool {
        let mut state = self.state.lock();
        self.apply_pending(&mut state)
    }

    fn reparse(&self, state: &mut TableState) {
        if state.query_text.trim().is_empty() {
            state.status = QueryStatus::Waiting;
            state.parse_errors.clear();
            state.pending_filter = None;
            state.active_filter = None;
            state.auto_apply = false;
            tracing::debug!(table = %self.id, "Query cleared");
            return;
        }

        let result = parse_query(&state.query_text, state.columns.columns());
        if result.is_valid() {
            state.status = QueryStatus::Query;
            state.pending_filter = result.filter;
            state.parse_errors.clear();
            if state.auto_apply {
                state.auto_apply = false;
                self.apply_pending(state);
            }
        } else {
            state.status = if self.ai_enabled() {
                QueryStatus::Ai
            } else {
                QueryStatus::Error
            };
            state.pending_filter = None;
            state.parse_errors = result.errors;
            state.auto_apply = false;
        }
        tracing::debug!(
            table = %self.id,
            status = ?state.status,
            errors = state.parse_errors.len(),
            "Query parsed"
        );
    }

    fn apply_pending(&self, state: &mut TableState) -> bool {
        let Some(filter) = state.pending_filter.clone() else {
            return false;
        };
        state.active_filter = Some(filter);
        let text = state.query_text.clone();
        state.recent.add_query(&text);
        tracing::debug!(table = %self.id, query = %text, "Filter applied");
        true
    }

    /// Ask the correction service to repair the current query text
    ///
    /// Only one resolution runs at a time; overlapping calls return
    /// [`ResolveOutcome::AlreadyPending`] without contacting the service.
    pub async fn resolve_invalid_query(&self) -> Result<ResolveOutcome, TableError> {
        let correction = self
            .services
            .correction
            .clone()
            .ok_or(TableError::AiDisabled)?;

        let (text, columns) = {
            let mut state = self.state.lock();
            if state.resolution == ResolutionState::Pending {
                tracing::debug!(table = %self.id, "Resolution already in flight");
                return Ok(ResolveOutcome::AlreadyPending);
            }
            if state.query_text.trim().is_empty() {
                return Ok(ResolveOutcome::Unresolved {
                    query: String::new(),
                    errors: Vec::new(),
                });
            }
            state.resolution = ResolutionState::Pending;
            (state.query_text.clone(), state.columns.columns().to_vec())
        };
        let _guard = ResolutionGuard { state: &self.state };

        tracing::debug!(table = %self.id, service = correction.name(), "Resolving query");
        let result = correction.correct(&text, &columns).await;

        let mut state = self.state.lock();
        let outcome = match result {
            Err(e) => {
                let error = classify(&ErrorSource::from(&e));
                tracing::warn!(table = %self.id, error = %e, "Query correction failed");
                state.filter_parsing_error = Some(error.clone());
                ResolveOutcome::Failed { error }
            }
            Ok(corrected) => {
                let parsed = parse_query(&corrected, state.columns.columns());
                if parsed.is_valid() {
                    state.query_text = corrected.clone();
                    state.status = QueryStatus::Query;
                    state.parse_errors.clear();
                    state.pending_filter = parsed.filter;
                    state.auto_apply = false;
                    state.filter_parsing_error = None;
                    self.apply_pending(&mut state);
                    tracing::info!(table = %self.id, original = %text, corrected = %corrected, "Query resolved");
                    ResolveOutcome::Resolved { query: corrected }
                } else {
                    tracing::info!(table = %self.id, corrected = %corrected, "Corrected query still invalid");
                    ResolveOutcome::Unresolved {
                        query: corrected,
                        errors: parsed.errors,
                    }
                }
            }
        };
        drop(state);
        Ok(outcome)
    }

    // =========================================================================
    // Rows and errors
    // =========================================================================

    /// Fetch a page of rows with the active filter and visible columns
    ///
    /// Failures are classified into the query error slot and returned.
    pub async fn fetch_rows(&self, offset: usize, limit: usize) -> Result<Rows, ErrorInfo> {
        let request = {
            let state = self.state.lock();
            FetchRequest {
                filter: state.active_filter.clone(),
                columns: state.columns.visible(),
                offset,
                limit,
            }
        };

        let result = self.services.rows.fetch(&request).await;

        let mut state = self.state.lock();
        match result {
            Ok(rows) => {
                state.query_error = None;
                Ok(rows)
            }
            Err(e) => {
                tracing::warn!(table = %self.id, error = %e, "Row fetch failed");
                let error = classify(&ErrorSource::from(&e));
                state.query_error = Some(error.clone());
                Err(error)
            }
        }
    }

    pub fn clear_error(&self, slot: ErrorSlot) {
        let mut state = self.state.lock();
        match slot {
            ErrorSlot::Query => state.query_error = None,
            ErrorSlot::FilterParsing => state.filter_parsing_error = None,
        }
    }

    // =========================================================================
    // Recent queries and saved filters
    // =========================================================================

    pub fn recent_queries(&self) -> Vec<String> {
        self.state.lock().recent.queries().to_vec()
    }

    pub fn add_recent_query(&self, text: &str) {
        self.state.lock().recent.add_query(text);
    }

    pub fn remove_recent_query(&self, text: &str) -> bool {
        self.state.lock().recent.remove_query(text)
    }

    pub fn clear_recent_queries(&self) {
        self.state.lock().recent.clear_queries();
    }

    pub fn saved_filters(&self) -> Vec<SavedFilter> {
        self.state.lock().saved.list().to_vec()
    }

    /// Save `text`, or the current query text when `None`
    pub fn save_filter(&self, text: Option<&str>) -> Option<SavedFilter> {
        let mut state = self.state.lock();
        let text = text.map_or_else(|| state.query_text.clone(), str::to_string);
        state.saved.save_filter(&text)
    }

    pub fn delete_filter(&self, id: &str) -> bool {
        self.state.lock().saved.delete_filter(id)
    }

    /// Put a saved filter's text in the editor and apply it once it parses
    pub fn load_filter(&self, id: &str) -> Result<QueryStatus, TableError> {
        let mut state = self.state.lock();
        let query = state
            .saved
            .get(id)
            .map(|f| f.query.clone())
            .ok_or_else(|| TableError::SavedFilterNotFound(id.to_string()))?;
        state.query_text = query;
        state.auto_apply = true;
        self.reparse(&mut state);
        Ok(state.status)
    }

    // =========================================================================
    // Columns
    // =========================================================================

    pub fn set_column_hidden(&self, name: &str, hidden: bool) -> Result<(), TableError> {
        let mut state = self.state.lock();
        state.columns.set_hidden(name, hidden)?;
        self.persist_layout(&state);
        Ok(())
    }

    pub fn move_column(&self, name: &str, position: usize) -> Result<(), TableError> {
        let mut state = self.state.lock();
        state.columns.move_column(name, position)?;
        self.persist_layout(&state);
        Ok(())
    }

    fn persist_layout(&self, state: &TableState) {
        store_json(
            self.services.store.as_ref(),
            &self.layout_key,
            &state.columns.layout(),
        );
    }
}
