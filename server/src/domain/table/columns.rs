//! Column definitions, visibility and ordering
//!
//! Columns are declared once per table mount. Afterwards only visibility and
//! position change, and both are captured by [`ColumnLayout`] so they survive
//! restarts.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::TableError;

/// Semantic column type, drives operator and value validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Number,
    Date,
    Boolean,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String => write!(f, "string"),
            ColumnType::Number => write!(f, "number"),
            ColumnType::Date => write!(f, "date"),
            ColumnType::Boolean => write!(f, "boolean"),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Column as declared in configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            header: None,
            column_type,
            width: None,
            filterable: true,
            hidden: false,
        }
    }
}

/// Mounted column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub header: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    pub filterable: bool,
    pub hidden: bool,
    pub position: usize,
}

/// Persisted column order and hidden set
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ColumnLayout {
    pub order: Vec<String>,
    pub hidden: Vec<String>,
}

/// Columns of one table, kept sorted by position
#[derive(Debug, Clone)]
pub struct ColumnSet {
    columns: Vec<Column>,
}

impl ColumnSet {
    /// Mount column definitions
    ///
    /// Names must be unique ignoring ASCII case, since queries resolve
    /// columns case-insensitively.
    pub fn new(defs: Vec<ColumnDef>) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(defs.len());

        for (position, def) in defs.into_iter().enumerate() {
            if !seen.insert(def.name.to_ascii_lowercase()) {
                return Err(TableError::DuplicateColumn(def.name));
            }
            columns.push(Column {
                header: def.header.unwrap_or_else(|| def.name.clone()),
                name: def.name,
                column_type: def.column_type,
                width: def.width,
                filterable: def.filterable,
                hidden: def.hidden,
                position,
            });
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Index of a column, matching the name case-insensitively
    fn position_of(&self, name: &str) -> Result<usize, TableError> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    /// Columns shown in the grid, in display order
    pub fn visible(&self) -> Vec<Column> {
        self.columns.iter().filter(|c| !c.hidden).cloned().collect()
    }

    pub fn set_hidden(&mut self, name: &str, hidden: bool) -> Result<(), TableError> {
        let index = self.position_of(name)?;
        self.columns[index].hidden = hidden;
        Ok(())
    }

    /// Move a column to `position`, shifting the others
    pub fn move_column(&mut self, name: &str, position: usize) -> Result<(), TableError> {
        if position >= self.columns.len() {
            return Err(TableError::InvalidPosition {
                position,
                len: self.columns.len(),
            });
        }
        let from = self.position_of(name)?;

        let column = self.columns.remove(from);
        self.columns.insert(position, column);
        self.renumber();
        Ok(())
    }

    pub fn layout(&self) -> ColumnLayout {
        ColumnLayout {
            order: self.columns.iter().map(|c| c.name.clone()).collect(),
            hidden: self
                .columns
                .iter()
                .filter(|c| c.hidden)
                .map(|c| c.name.clone())
                .collect(),
        }
    }

    /// Restore a persisted layout
    ///
    /// Names no longer defined are ignored; columns missing from the layout
    /// keep their declared relative order after the known ones. Visibility is
    /// only overridden for columns the layout knows about.
    pub fn apply_layout(&mut self, layout: &ColumnLayout) {
        let rank = |name: &str| layout.order.iter().position(|n| n == name);
        self.columns
            .sort_by_key(|c| (rank(&c.name).unwrap_or(usize::MAX), c.position));

        for column in &mut self.columns {
            if rank(&column.name).is_some() {
                column.hidden = layout.hidden.contains(&column.name);
            }
        }
        self.renumber();
    }

    fn renumber(&mut self) {
        for (position, column) in self.columns.iter_mut().enumerate() {
            column.position = position;
        }
    }
}
