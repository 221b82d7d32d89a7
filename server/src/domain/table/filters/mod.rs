//! Filter trees and query parsing

mod parser;
mod types;

pub use parser::{ParseResult, QueryError, parse_date, parse_query};
pub use types::{Filter, FilterValue, GroupOp, Operator, SqlParams};
