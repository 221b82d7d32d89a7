//! Query text parsing
//!
//! Turns free-text queries such as `status = open and (amount > 10 or name:"acme")`
//! into a [`Filter`] tree, validated against the table's columns.
//!
//! ```text
//! query     := or_expr
//! or_expr   := and_expr ( "OR" and_expr )*
//! and_expr  := primary ( "AND"? primary )*
//! primary   := "(" or_expr ")" | condition
//! condition := column operator value
//! ```
//!
//! Syntax errors stop parsing and yield no tree. Column, operator and value
//! problems are all collected next to the tree so the editor can show every
//! one of them at once.

use chrono::{DateTime, NaiveDate, Utc};
use nom::IResult;
use nom::Offset;
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag, tag_no_case, take_while, take_while1};
use nom::character::complete::{char, multispace0, satisfy};
use nom::combinator::{all_consuming, map, not, opt, recognize, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, terminated};
use serde::Serialize;
use thiserror::Error;

use super::types::{Filter, FilterValue, GroupOp, Operator};
use crate::domain::table::columns::{Column, ColumnType};

/// Maximum parenthesis nesting accepted
const MAX_NESTING: usize = 32;

/// Problem found in a query, with the byte offset it refers to
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryError {
    #[error("Unexpected input at position {offset}")]
    Syntax { offset: usize },

    #[error("Parentheses nested deeper than {max}")]
    TooDeep { max: usize },

    #[error("Unknown column '{column}'")]
    UnknownColumn { column: String, offset: usize },

    #[error("Column '{column}' is not filterable")]
    NotFilterable { column: String, offset: usize },

    #[error("Operator '{operator}' is not supported for {column_type} column '{column}'")]
    UnsupportedOperator {
        column: String,
        operator: Operator,
        column_type: ColumnType,
        offset: usize,
    },

    #[error("'{value}' is not a valid {column_type} for column '{column}'")]
    InvalidValue {
        column: String,
        value: String,
        column_type: ColumnType,
        offset: usize,
    },
}

/// Outcome of parsing one query text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    pub filter: Option<Filter>,
    pub errors: Vec<QueryError>,
}

impl ParseResult {
    /// A result is valid only if a tree was produced and nothing is wrong with it
    pub fn is_valid(&self) -> bool {
        self.filter.is_some() && self.errors.is_empty()
    }
}

/// Parse query text against a table's columns
///
/// Blank text produces neither a filter nor errors.
pub fn parse_query(text: &str, columns: &[Column]) -> ParseResult {
    if text.trim().is_empty() {
        return ParseResult {
            filter: None,
            errors: Vec::new(),
        };
    }

    if nesting_depth(text) > MAX_NESTING {
        return ParseResult {
            filter: None,
            errors: vec![QueryError::TooDeep { max: MAX_NESTING }],
        };
    }

    match all_consuming(ws(or_expr))(text) {
        Ok((_, expr)) => {
            let mut errors = Vec::new();
            let filter = lower(expr, text, columns, &mut errors);
            ParseResult {
                filter: Some(filter),
                errors,
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => ParseResult {
            filter: None,
            errors: vec![QueryError::Syntax {
                offset: text.offset(e.input),
            }],
        },
        Err(nom::Err::Incomplete(_)) => ParseResult {
            filter: None,
            errors: vec![QueryError::Syntax { offset: text.len() }],
        },
    }
}

// =============================================================================
// Grammar
// =============================================================================

/// Syntax tree before column validation
#[derive(Debug)]
enum Expr<'a> {
    Group(GroupOp, Vec<Expr<'a>>),
    Condition {
        column: &'a str,
        operator: Operator,
        value: String,
    },
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Case-insensitive keyword that is not the prefix of a longer word
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(kw), not(satisfy(is_ident_char)))
}

fn identifier(i: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(i)
}

fn comparison_op(i: &str) -> IResult<&str, Operator> {
    alt((
        value(Operator::Ne, tag("!=")),
        value(Operator::Ne, tag("<>")),
        value(Operator::Gte, tag(">=")),
        value(Operator::Lte, tag("<=")),
        value(Operator::Eq, tag("==")),
        value(Operator::Eq, tag("=")),
        value(Operator::Gt, tag(">")),
        value(Operator::Lt, tag("<")),
        value(Operator::Contains, tag(":")),
        value(Operator::Contains, keyword("contains")),
        value(Operator::StartsWith, keyword("starts_with")),
        value(Operator::EndsWith, keyword("ends_with")),
    ))(i)
}

fn double_quoted(i: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                is_not("\\\""),
                '\\',
                alt((value("\\", tag("\\")), value("\"", tag("\"")))),
            )),
            |s: Option<String>| s.unwrap_or_default(),
        ),
        char('"'),
    )(i)
}

fn single_quoted(i: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        map(
            opt(escaped_transform(
                is_not("\\'"),
                '\\',
                alt((value("\\", tag("\\")), value("'", tag("'")))),
            )),
            |s: Option<String>| s.unwrap_or_default(),
        ),
        char('\''),
    )(i)
}

fn bare_value(i: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | '\'')),
        |s: &str| s.to_string(),
    )(i)
}

fn condition(i: &str) -> IResult<&str, Expr<'_>> {
    let (i, column) = ws(identifier)(i)?;
    let (i, operator) = ws(comparison_op)(i)?;
    let (i, value) = ws(alt((double_quoted, single_quoted, bare_value)))(i)?;
    Ok((
        i,
        Expr::Condition {
            column,
            operator,
            value,
        },
    ))
}

fn primary(i: &str) -> IResult<&str, Expr<'_>> {
    alt((delimited(ws(char('(')), or_expr, ws(char(')'))), condition))(i)
}

fn and_expr(i: &str) -> IResult<&str, Expr<'_>> {
    let (i, first) = primary(i)?;
    let (i, rest) = many0(preceded(opt(ws(keyword("and"))), primary))(i)?;
    Ok((i, join(GroupOp::And, first, rest)))
}

fn or_expr(i: &str) -> IResult<&str, Expr<'_>> {
    let (i, first) = and_expr(i)?;
    let (i, rest) = many0(preceded(ws(keyword("or")), and_expr))(i)?;
    Ok((i, join(GroupOp::Or, first, rest)))
}

fn join<'a>(op: GroupOp, first: Expr<'a>, rest: Vec<Expr<'a>>) -> Expr<'a> {
    if rest.is_empty() {
        return first;
    }
    let mut members = Vec::with_capacity(rest.len() + 1);
    members.push(first);
    members.extend(rest);
    Expr::Group(op, members)
}

/// Deepest parenthesis nesting outside quoted strings
fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => {
                    depth += 1;
                    max = max.max(depth);
                }
                ')' => depth = depth.saturating_sub(1),
                _ => {}
            },
        }
    }
    max
}

// =============================================================================
// Validation
// =============================================================================

fn lower(expr: Expr<'_>, input: &str, columns: &[Column], errors: &mut Vec<QueryError>) -> Filter {
    match expr {
        Expr::Group(op, members) => Filter::group(
            op,
            members
                .into_iter()
                .map(|m| lower(m, input, columns, errors))
                .collect(),
        ),
        Expr::Condition {
            column,
            operator,
            value,
        } => {
            let offset = input.offset(column);
            let Some(col) = columns.iter().find(|c| c.name.eq_ignore_ascii_case(column)) else {
                errors.push(QueryError::UnknownColumn {
                    column: column.to_string(),
                    offset,
                });
                return Filter::Condition {
                    column: column.to_string(),
                    operator,
                    value: FilterValue::String(value),
                };
            };

            if !col.filterable {
                errors.push(QueryError::NotFilterable {
                    column: col.name.clone(),
                    offset,
                });
            }
            if !operator.supports(col.column_type) {
                errors.push(QueryError::UnsupportedOperator {
                    column: col.name.clone(),
                    operator,
                    column_type: col.column_type,
                    offset,
                });
            }

            let value = match coerce(&value, col.column_type) {
                Some(typed) => typed,
                None => {
                    errors.push(QueryError::InvalidValue {
                        column: col.name.clone(),
                        value: value.clone(),
                        column_type: col.column_type,
                        offset,
                    });
                    FilterValue::String(value)
                }
            };

            Filter::Condition {
                column: col.name.clone(),
                operator,
                value,
            }
        }
    }
}

fn coerce(raw: &str, column_type: ColumnType) -> Option<FilterValue> {
    match column_type {
        ColumnType::String => Some(FilterValue::String(raw.to_string())),
        ColumnType::Number => raw
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(FilterValue::Number),
        ColumnType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(FilterValue::Boolean(true)),
            "false" | "no" | "0" => Some(FilterValue::Boolean(false)),
            _ => None,
        },
        ColumnType::Date => parse_date(raw).map(FilterValue::Date),
    }
}

/// RFC 3339 timestamp or plain `YYYY-MM-DD` (midnight UTC)
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::columns::{ColumnDef, ColumnSet};

    fn columns() -> Vec<Column> {
        let mut internal = ColumnDef::new("internal_ref", ColumnType::String);
        internal.filterable = false;
        ColumnSet::new(vec![
            ColumnDef::new("status", ColumnType::String),
            ColumnDef::new("amount", ColumnType::Number),
            ColumnDef::new("created", ColumnType::Date),
            ColumnDef::new("paid", ColumnType::Boolean),
            ColumnDef::new("name", ColumnType::String),
            internal,
        ])
        .unwrap()
        .columns()
        .to_vec()
    }

    fn cond(column: &str, operator: Operator, value: FilterValue) -> Filter {
        Filter::Condition {
            column: column.to_string(),
            operator,
            value,
        }
    }

    #[test]
    fn test_single_condition() {
        let result = parse_query("status = open", &columns());
        assert!(result.is_valid());
        assert_eq!(
            result.filter,
            Some(cond(
                "status",
                Operator::Eq,
                FilterValue::String("open".into())
            ))
        );
    }

    #[test]
    fn test_blank_text_is_neither_valid_nor_erroneous() {
        let result = parse_query("   ", &columns());
        assert!(!result.is_valid());
        assert!(result.filter.is_none());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let result = parse_query("status = open or amount > 5 and paid = true", &columns());
        assert!(result.is_valid());
        assert_eq!(
            result.filter.unwrap(),
            Filter::Group {
                op: GroupOp::Or,
                filters: vec![
                    cond("status", Operator::Eq, FilterValue::String("open".into())),
                    Filter::Group {
                        op: GroupOp::And,
                        filters: vec![
                            cond("amount", Operator::Gt, FilterValue::Number(5.0)),
                            cond("paid", Operator::Eq, FilterValue::Boolean(true)),
                        ],
                    },
                ],
            }
        );
    }

    #[test]
    fn test_juxtaposition_means_and_and_groups_flatten() {
        let result = parse_query("(amount >= 1 amount <= 9) AND status != closed", &columns());
        assert!(result.is_valid());
        match result.filter.unwrap() {
            Filter::Group { op, filters } => {
                assert_eq!(op, GroupOp::And);
                assert_eq!(filters.len(), 3);
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_quoted_values_and_string_operators() {
        let result = parse_query(
            r#"name:"acme \"west\"" or name starts_with 'o\'brien'"#,
            &columns(),
        );
        assert!(result.is_valid());
        assert_eq!(
            result.filter.unwrap(),
            Filter::Group {
                op: GroupOp::Or,
                filters: vec![
                    cond(
                        "name",
                        Operator::Contains,
                        FilterValue::String("acme \"west\"".into())
                    ),
                    cond(
                        "name",
                        Operator::StartsWith,
                        FilterValue::String("o'brien".into())
                    ),
                ],
            }
        );
    }

    #[test]
    fn test_empty_quoted_value() {
        let result = parse_query(r#"name = """#, &columns());
        assert!(result.is_valid());
        assert_eq!(
            result.filter,
            Some(cond("name", Operator::Eq, FilterValue::String(String::new())))
        );
    }

    #[test]
    fn test_column_names_are_case_insensitive() {
        let result = parse_query("STATUS = open", &columns());
        assert!(result.is_valid());
        assert_eq!(
            result.filter,
            Some(cond(
                "status",
                Operator::Eq,
                FilterValue::String("open".into())
            ))
        );
    }

    #[test]
    fn test_keyword_prefix_is_not_a_keyword() {
        // "origin" must not be read as OR + "igin"
        let cols = ColumnSet::new(vec![
            ColumnDef::new("a", ColumnType::Number),
            ColumnDef::new("origin", ColumnType::String),
        ])
        .unwrap();
        let result = parse_query("a = 1 origin = x", cols.columns());
        assert!(result.is_valid());
        assert_eq!(
            result.filter.unwrap(),
            Filter::Group {
                op: GroupOp::And,
                filters: vec![
                    cond("a", Operator::Eq, FilterValue::Number(1.0)),
                    cond("origin", Operator::Eq, FilterValue::String("x".into())),
                ],
            }
        );
    }

    #[test]
    fn test_dates_accept_plain_and_rfc3339() {
        let result = parse_query(
            "created >= 2024-01-01 created < 2024-02-01T12:00:00Z",
            &columns(),
        );
        assert!(result.is_valid());
        let expected = parse_date("2024-01-01T00:00:00Z").unwrap();
        match result.filter.unwrap() {
            Filter::Group { filters, .. } => {
                assert_eq!(
                    filters[0],
                    cond("created", Operator::Gte, FilterValue::Date(expected))
                );
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_reports_offset_and_no_tree() {
        let result = parse_query("status = open and", &columns());
        assert!(!result.is_valid());
        assert!(result.filter.is_none());
        assert_eq!(result.errors, vec![QueryError::Syntax { offset: 14 }]);
    }

    #[test]
    fn test_unbalanced_parenthesis_is_syntax_error() {
        let result = parse_query("(status = open", &columns());
        assert!(result.filter.is_none());
        assert!(matches!(result.errors[0], QueryError::Syntax { .. }));
    }

    #[test]
    fn test_semantic_errors_are_all_collected() {
        let result = parse_query(
            "colour = red and amount > lots and status > b and internal_ref = x",
            &columns(),
        );
        assert!(!result.is_valid());
        assert!(result.filter.is_some());
        assert_eq!(
            result.errors,
            vec![
                QueryError::UnknownColumn {
                    column: "colour".into(),
                    offset: 0
                },
                QueryError::InvalidValue {
                    column: "amount".into(),
                    value: "lots".into(),
                    column_type: ColumnType::Number,
                    offset: 17,
                },
                QueryError::UnsupportedOperator {
                    column: "status".into(),
                    operator: Operator::Gt,
                    column_type: ColumnType::String,
                    offset: 35,
                },
                QueryError::NotFilterable {
                    column: "internal_ref".into(),
                    offset: 50,
                },
            ]
        );
    }

    #[test]
    fn test_boolean_values() {
        let result = parse_query("paid = no", &columns());
        assert_eq!(
            result.filter,
            Some(cond("paid", Operator::Eq, FilterValue::Boolean(false)))
        );
        let result = parse_query("paid = maybe", &columns());
        assert!(!result.is_valid());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}status = a{}", "(".repeat(40), ")".repeat(40));
        let result = parse_query(&deep, &columns());
        assert_eq!(result.errors, vec![QueryError::TooDeep { max: MAX_NESTING }]);

        // parentheses inside quotes do not count
        let quoted = format!("name = \"{}\"", "(".repeat(40));
        assert!(parse_query(&quoted, &columns()).is_valid());
    }

    #[test]
    fn test_error_messages() {
        let err = QueryError::UnsupportedOperator {
            column: "status".into(),
            operator: Operator::Gt,
            column_type: ColumnType::String,
            offset: 0,
        };
        assert_eq!(
            err.to_string(),
            "Operator '>' is not supported for string column 'status'"
        );
    }
}
