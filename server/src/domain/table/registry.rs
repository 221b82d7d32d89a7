//! Mounted tables by id

use std::collections::BTreeMap;
use std::sync::Arc;

use super::controller::TableController;
use super::error::TableError;

#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: BTreeMap<String, Arc<TableController>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mounted table, replacing any table with the same id
    pub fn insert(&mut self, table: TableController) {
        let id = table.id().to_string();
        if self.tables.insert(id.clone(), Arc::new(table)).is_some() {
            tracing::warn!(table = %id, "Replaced previously mounted table");
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<TableController>, TableError> {
        self.tables
            .get(id)
            .cloned()
            .ok_or_else(|| TableError::NotFound(id.to_string()))
    }

    /// Table ids in sorted order
    pub fn ids(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
