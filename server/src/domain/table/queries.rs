//! Recent queries and saved filters
//!
//! Both collections are loaded once when a table mounts and written back on
//! every change. Storage trouble never surfaces to callers: reads degrade to
//! empty collections and writes are logged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::constants::{KEY_RECENT_QUERIES, KEY_SAVED_FILTERS};
use crate::data::persist::{KeyValueStore, load_or_default, state_key, store_json};

/// Most-recent-first query history, deduplicated by trimmed text
#[derive(Debug)]
pub struct RecentQueries {
    store: Arc<dyn KeyValueStore>,
    key: String,
    max_queries: usize,
    queries: Vec<String>,
}

impl RecentQueries {
    pub fn load(store: Arc<dyn KeyValueStore>, table: &str, max_queries: usize) -> Self {
        let key = state_key(table, KEY_RECENT_QUERIES);
        let stored: Vec<String> = load_or_default(store.as_ref(), &key);

        // Hand-edited state may carry blanks, padding or repeats
        let mut queries: Vec<String> = Vec::with_capacity(stored.len());
        for query in stored {
            let query = query.trim();
            if !query.is_empty() && !queries.iter().any(|q| q == query) {
                queries.push(query.to_string());
            }
        }
        queries.truncate(max_queries);
        tracing::debug!(table, count = queries.len(), "Loaded recent queries");
        Self {
            store,
            key,
            max_queries,
            queries,
        }
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    /// Record a query as the most recent one. Blank text is ignored.
    pub fn add_query(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.queries.retain(|q| q != text);
        self.queries.insert(0, text.to_string());
        self.queries.truncate(self.max_queries);
        self.persist();
    }

    /// Returns whether an entry was removed
    pub fn remove_query(&mut self, text: &str) -> bool {
        let text = text.trim();
        let before = self.queries.len();
        self.queries.retain(|q| q != text);
        let removed = self.queries.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear_queries(&mut self) {
        self.queries.clear();
        self.persist();
    }

    fn persist(&self) {
        store_json(self.store.as_ref(), &self.key, &self.queries);
    }
}

/// A named query kept until explicitly deleted
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SavedFilter {
    pub id: String,
    pub query: String,
    /// Creation time, Unix epoch milliseconds
    pub timestamp: i64,
}

/// Saved filters in insertion order
#[derive(Debug)]
pub struct SavedFilters {
    store: Arc<dyn KeyValueStore>,
    key: String,
    filters: Vec<SavedFilter>,
}

impl SavedFilters {
    pub fn load(store: Arc<dyn KeyValueStore>, table: &str) -> Self {
        let key = state_key(table, KEY_SAVED_FILTERS);
        let filters: Vec<SavedFilter> = load_or_default(store.as_ref(), &key);
        tracing::debug!(table, count = filters.len(), "Loaded saved filters");
        Self {
            store,
            key,
            filters,
        }
    }

    pub fn list(&self) -> &[SavedFilter] {
        &self.filters
    }

    pub fn get(&self, id: &str) -> Option<&SavedFilter> {
        self.filters.iter().find(|f| f.id == id)
    }

    /// Save query text
    ///
    /// Returns `None` when the text is blank or an entry with the same trimmed
    /// text already exists.
    pub fn save_filter(&mut self, text: &str) -> Option<SavedFilter> {
        let text = text.trim();
        if text.is_empty() || self.filters.iter().any(|f| f.query.trim() == text) {
            return None;
        }
        let filter = SavedFilter {
            id: Uuid::new_v4().to_string(),
            query: text.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        self.filters.push(filter.clone());
        self.persist();
        Some(filter)
    }

    /// Returns whether a filter with this id existed
    pub fn delete_filter(&mut self, id: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f.id != id);
        let removed = self.filters.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    fn persist(&self) {
        store_json(self.store.as_ref(), &self.key, &self.filters);
    }
}
