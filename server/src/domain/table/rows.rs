//! Row fetching
//!
//! [`RowSource`] is the data-fetch boundary: it receives the active filter and
//! the visible columns and returns one page of rows. [`MemoryRowSource`]
//! evaluates filters over JSON objects held in memory, optionally loaded from
//! a JSON array file at startup.

use std::cmp::Ordering;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use super::columns::Column;
use super::error::{ServiceError, TableError};
use super::filters::{Filter, FilterValue, GroupOp, Operator, parse_date};
use crate::core::constants::MAX_FETCH_ROWS;

pub type Row = Map<String, Value>;

/// One page request
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub filter: Option<Filter>,
    /// Columns to return, in display order
    pub columns: Vec<Column>,
    pub offset: usize,
    pub limit: usize,
}

/// One page of rows plus the number of rows matching the filter
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rows {
    pub rows: Vec<Row>,
    pub total: usize,
}

#[async_trait]
pub trait RowSource: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, request: &FetchRequest) -> Result<Rows, ServiceError>;
}

#[derive(Debug, Default)]
pub struct MemoryRowSource {
    rows: Vec<Row>,
}

impl MemoryRowSource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Load rows from a file holding a JSON array of objects
    pub fn from_file(table: &str, path: &Path) -> Result<Self, TableError> {
        let rows_error = |message: String| TableError::Rows {
            table: table.to_string(),
            message,
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| rows_error(format!("{}: {}", path.display(), e)))?;
        let rows: Vec<Row> = serde_json::from_str(&content)
            .map_err(|e| rows_error(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(table, count = rows.len(), path = %path.display(), "Loaded rows");
        Ok(Self { rows })
    }
}

#[async_trait]
impl RowSource for MemoryRowSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Rows, ServiceError> {
        let matched: Vec<&Row> = self
            .rows
            .iter()
            .filter(|row| request.filter.as_ref().is_none_or(|f| matches(f, row)))
            .collect();

        let limit = request.limit.min(MAX_FETCH_ROWS);
        let rows = matched
            .iter()
            .skip(request.offset)
            .take(limit)
            .map(|row| project(row, &request.columns))
            .collect();

        Ok(Rows {
            rows,
            total: matched.len(),
        })
    }
}

fn project(row: &Row, columns: &[Column]) -> Row {
    columns
        .iter()
        .map(|c| {
            (
                c.name.clone(),
                row.get(&c.name).cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}

/// Evaluate a filter tree against one row
///
/// Missing and null cells only satisfy `!=`. String `contains`, `starts_with`
/// and `ends_with` ignore case; `=` and `!=` do not.
pub fn matches(filter: &Filter, row: &Row) -> bool {
    match filter {
        Filter::Group { op, filters } => match op {
            GroupOp::And => filters.iter().all(|f| matches(f, row)),
            GroupOp::Or => filters.is_empty() || filters.iter().any(|f| matches(f, row)),
        },
        Filter::Condition {
            column,
            operator,
            value,
        } => {
            let cell = match row.get(column) {
                Some(Value::Null) | None => return *operator == Operator::Ne,
                Some(cell) => cell,
            };
            match value {
                FilterValue::String(expected) => match_string(cell, *operator, expected),
                FilterValue::Number(expected) => {
                    let actual = match cell {
                        Value::Number(n) => n.as_f64(),
                        Value::String(s) => s.trim().parse::<f64>().ok(),
                        _ => None,
                    };
                    compare(actual.and_then(|a| a.partial_cmp(expected)), *operator)
                }
                FilterValue::Boolean(expected) => {
                    let actual = match cell {
                        Value::Bool(b) => Some(*b),
                        Value::String(s) => s.parse::<bool>().ok(),
                        _ => None,
                    };
                    compare(actual.map(|a| a.cmp(expected)), *operator)
                }
                FilterValue::Date(expected) => {
                    let actual = cell.as_str().and_then(parse_date);
                    compare(actual.map(|a| a.cmp(expected)), *operator)
                }
            }
        }
    }
}

fn match_string(cell: &Value, operator: Operator, expected: &str) -> bool {
    let actual = match cell {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match operator {
        Operator::Contains => actual.to_lowercase().contains(&expected.to_lowercase()),
        Operator::StartsWith => actual.to_lowercase().starts_with(&expected.to_lowercase()),
        Operator::EndsWith => actual.to_lowercase().ends_with(&expected.to_lowercase()),
        _ => compare(Some(actual.as_str().cmp(expected)), operator),
    }
}

/// Apply a comparison operator to an ordering; incomparable values only satisfy `!=`
fn compare(ordering: Option<Ordering>, operator: Operator) -> bool {
    let Some(ordering) = ordering else {
        return operator == Operator::Ne;
    };
    match operator {
        Operator::Eq => ordering == Ordering::Equal,
        Operator::Ne => ordering != Ordering::Equal,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Gte => ordering != Ordering::Less,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Lte => ordering != Ordering::Greater,
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::columns::{ColumnDef, ColumnSet, ColumnType};
    use crate::domain::table::filters::parse_query;
    use serde_json::json;

    fn column_set() -> ColumnSet {
        ColumnSet::new(vec![
            ColumnDef::new("id", ColumnType::Number),
            ColumnDef::new("status", ColumnType::String),
            ColumnDef::new("amount", ColumnType::Number),
            ColumnDef::new("created", ColumnType::Date),
            ColumnDef::new("paid", ColumnType::Boolean),
        ])
        .unwrap()
    }

    fn rows() -> Vec<Row> {
        let values = json!([
            {"id": 1, "status": "open", "amount": 50, "created": "2024-01-10", "paid": false},
            {"id": 2, "status": "Closed", "amount": 150.5, "created": "2024-02-01T08:00:00Z", "paid": true},
            {"id": 3, "status": "open", "amount": 500, "created": "2024-03-15", "paid": true},
            {"id": 4, "status": null, "amount": "75", "created": "not a date", "paid": "false"}
        ]);
        serde_json::from_value(values).unwrap()
    }

    fn filter(text: &str) -> Filter {
        let result = parse_query(text, column_set().columns());
        assert!(result.is_valid(), "{:?}", result.errors);
        result.filter.unwrap()
    }

    fn ids(text: &str) -> Vec<i64> {
        let f = filter(text);
        rows()
            .iter()
            .filter(|r| matches(&f, r))
            .map(|r| r["id"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_string_comparisons() {
        assert_eq!(ids("status = open"), vec![1, 3]);
        assert_eq!(ids("status != open"), vec![2, 4]);
        assert_eq!(ids("status:clo"), vec![2]);
        assert_eq!(ids("status ends_with EN"), vec![1, 3]);
    }

    #[test]
    fn test_numbers_accept_numeric_strings() {
        assert_eq!(ids("amount > 60"), vec![2, 3, 4]);
        assert_eq!(ids("amount <= 75"), vec![1, 4]);
    }

    #[test]
    fn test_dates_and_booleans() {
        assert_eq!(ids("created >= 2024-02-01"), vec![2, 3]);
        assert_eq!(ids("paid = true"), vec![2, 3]);
        assert_eq!(ids("paid = false"), vec![1, 4]);
    }

    #[test]
    fn test_groups() {
        assert_eq!(ids("status = open and (amount < 100 or paid = true)"), vec![1, 3]);
        assert_eq!(ids("id = 1 or id = 4"), vec![1, 4]);
    }

    #[tokio::test]
    async fn test_fetch_projects_and_pages() {
        let source = MemoryRowSource::new(rows());
        let mut set = column_set();
        set.set_hidden("created", true).unwrap();
        set.set_hidden("paid", true).unwrap();

        let request = FetchRequest {
            filter: Some(filter("amount > 10")),
            columns: set.visible(),
            offset: 1,
            limit: 2,
        };
        let page = source.fetch(&request).await.unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0]["id"], 2);
        assert!(page.rows[0].get("created").is_none());
        assert_eq!(page.rows[1]["status"], "open");
    }

    #[tokio::test]
    async fn test_fetch_without_filter_returns_everything() {
        let source = MemoryRowSource::new(rows());
        let request = FetchRequest {
            filter: None,
            columns: column_set().visible(),
            offset: 0,
            limit: 100,
        };
        assert_eq!(source.fetch(&request).await.unwrap().total, 4);
        assert_eq!(MemoryRowSource::empty().fetch(&request).await.unwrap().total, 0);
    }

    #[test]
    fn test_from_file_loads_array_and_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("orders.json");
        std::fs::write(&good, r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        assert!(MemoryRowSource::from_file("orders", &good).is_ok());

        let bad = dir.path().join("broken.json");
        std::fs::write(&bad, r#"{"id": 1}"#).unwrap();
        let err = MemoryRowSource::from_file("orders", &bad).unwrap_err();
        assert!(matches!(err, TableError::Rows { ref table, .. } if table == "orders"));

        let missing = dir.path().join("missing.json");
        assert!(MemoryRowSource::from_file("orders", &missing).is_err());
    }
}
