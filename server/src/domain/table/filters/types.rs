//! Filter type definitions
//!
//! A filter is a tree of AND/OR groups whose leaves compare one column to one
//! value. Trees are immutable; a new query produces a new tree.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::table::columns::ColumnType;

/// Filter tree node
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Group {
        op: GroupOp,
        filters: Vec<Filter>,
    },
    Condition {
        column: String,
        operator: Operator,
        value: FilterValue,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "starts_with")]
    StartsWith,
    #[serde(rename = "ends_with")]
    EndsWith,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
        }
    }

    /// Whether the operator can be applied to a column of this type
    pub fn supports(&self, column_type: ColumnType) -> bool {
        match self {
            Self::Eq | Self::Ne => true,
            Self::Gt | Self::Gte | Self::Lt | Self::Lte => {
                matches!(column_type, ColumnType::Number | ColumnType::Date)
            }
            Self::Contains | Self::StartsWith | Self::EndsWith => {
                column_type == ColumnType::String
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed comparison value
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
}

/// Collects SQL parameters during query building (maintains insertion order)
#[derive(Debug, Default)]
pub struct SqlParams {
    pub values: Vec<String>,
}

impl Filter {
    /// Build a group, flattening nested groups of the same operator and
    /// collapsing single-member groups to that member
    pub fn group(op: GroupOp, filters: Vec<Filter>) -> Filter {
        let mut flat = Vec::with_capacity(filters.len());
        for filter in filters {
            match filter {
                Filter::Group {
                    op: inner,
                    filters: children,
                } if inner == op => flat.extend(children),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            return flat.remove(0);
        }
        Filter::Group { op, filters: flat }
    }

    /// Generate SQL WHERE clause fragment
    /// Returns the SQL clause with ? placeholders and updates params
    pub fn to_sql(&self, params: &mut SqlParams) -> String {
        match self {
            Self::Group { op, filters } => {
                if filters.is_empty() {
                    return "1=1".to_string();
                }
                let joiner = match op {
                    GroupOp::And => " AND ",
                    GroupOp::Or => " OR ",
                };
                let parts: Vec<String> = filters.iter().map(|f| f.to_sql(params)).collect();
                format!("({})", parts.join(joiner))
            }
            Self::Condition {
                column,
                operator,
                value,
            } => condition_sql(column, *operator, value, params),
        }
    }
}

fn condition_sql(
    column: &str,
    operator: Operator,
    value: &FilterValue,
    params: &mut SqlParams,
) -> String {
    match value {
        FilterValue::Boolean(b) => {
            let sql_bool = if *b { "TRUE" } else { "FALSE" };
            let op = if operator == Operator::Ne { "<>" } else { "=" };
            format!("{} {} {}", column, op, sql_bool)
        }
        FilterValue::String(s) => match operator {
            Operator::Contains => {
                params
                    .values
                    .push(format!("%{}%", escape_like(s)));
                format!("{} LIKE ? ESCAPE '\\'", column)
            }
            Operator::StartsWith => {
                params.values.push(format!("{}%", escape_like(s)));
                format!("{} LIKE ? ESCAPE '\\'", column)
            }
            Operator::EndsWith => {
                params.values.push(format!("%{}", escape_like(s)));
                format!("{} LIKE ? ESCAPE '\\'", column)
            }
            _ => {
                params.values.push(s.clone());
                format!("{} {} ?", column, comparison(operator))
            }
        },
        FilterValue::Number(n) => {
            params.values.push(n.to_string());
            format!("{} {} ?", column, comparison(operator))
        }
        FilterValue::Date(d) => {
            params.values.push(d.to_rfc3339());
            format!("{} {} ?", column, comparison(operator))
        }
    }
}

/// Escape LIKE metacharacters (%, _, \) in user input
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn comparison(operator: Operator) -> &'static str {
    match operator {
        Operator::Ne => "<>",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        _ => "=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(column: &str, operator: Operator, value: FilterValue) -> Filter {
        Filter::Condition {
            column: column.to_string(),
            operator,
            value,
        }
    }

    #[test]
    fn test_string_filter_contains() {
        let filter = cond(
            "name",
            Operator::Contains,
            FilterValue::String("50%".to_string()),
        );
        let mut params = SqlParams::default();
        let sql = filter.to_sql(&mut params);

        assert_eq!(sql, r"name LIKE ? ESCAPE '\'");
        assert_eq!(params.values, vec![r"%50\%%"]);
    }

    #[test]
    fn test_number_filter_all_operators() {
        let operators = [
            (Operator::Eq, "="),
            (Operator::Ne, "<>"),
            (Operator::Gt, ">"),
            (Operator::Lt, "<"),
            (Operator::Gte, ">="),
            (Operator::Lte, "<="),
        ];

        for (op, expected_op) in operators {
            let filter = cond("amount", op, FilterValue::Number(100.5));
            let mut params = SqlParams::default();
            let sql = filter.to_sql(&mut params);

            assert_eq!(sql, format!("amount {} ?", expected_op));
            assert_eq!(params.values, vec!["100.5"]);
        }
    }

    #[test]
    fn test_boolean_filter_inlines_literal() {
        let filter = cond("active", Operator::Ne, FilterValue::Boolean(true));
        let mut params = SqlParams::default();
        assert_eq!(filter.to_sql(&mut params), "active <> TRUE");
        assert!(params.values.is_empty());
    }

    #[test]
    fn test_nested_groups_keep_parameter_order() {
        let filter = Filter::group(
            GroupOp::And,
            vec![
                cond("status", Operator::Eq, FilterValue::String("open".into())),
                Filter::group(
                    GroupOp::Or,
                    vec![
                        cond("amount", Operator::Gt, FilterValue::Number(10.0)),
                        cond("name", Operator::StartsWith, FilterValue::String("a".into())),
                    ],
                ),
            ],
        );
        let mut params = SqlParams::default();
        let sql = filter.to_sql(&mut params);

        assert_eq!(
            sql,
            r"(status = ? AND (amount > ? OR name LIKE ? ESCAPE '\'))"
        );
        assert_eq!(params.values, vec!["open", "10", "a%"]);
    }

    #[test]
    fn test_group_flattens_same_operator_and_collapses_singletons() {
        let a = cond("a", Operator::Eq, FilterValue::Number(1.0));
        let b = cond("b", Operator::Eq, FilterValue::Number(2.0));
        let c = cond("c", Operator::Eq, FilterValue::Number(3.0));

        let nested = Filter::group(
            GroupOp::And,
            vec![Filter::group(GroupOp::And, vec![a.clone(), b.clone()]), c.clone()],
        );
        assert_eq!(
            nested,
            Filter::Group {
                op: GroupOp::And,
                filters: vec![a.clone(), b, c]
            }
        );
        assert_eq!(Filter::group(GroupOp::Or, vec![a.clone()]), a);
    }

    #[test]
    fn test_operator_support_by_column_type() {
        assert!(Operator::Gt.supports(ColumnType::Date));
        assert!(!Operator::Gt.supports(ColumnType::String));
        assert!(Operator::Contains.supports(ColumnType::String));
        assert!(!Operator::Contains.supports(ColumnType::Number));
        assert!(Operator::Ne.supports(ColumnType::Boolean));
    }

    #[test]
    fn test_serializes_with_type_tags() {
        let filter = cond("amount", Operator::Gte, FilterValue::Number(5.0));
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["type"], "condition");
        assert_eq!(json["operator"], ">=");
        assert_eq!(json["value"]["kind"], "number");
    }
}
