//! Data-table filtering and state
//!
//! - `filters` - filter trees and the query text parser
//! - `columns` - column definitions, visibility and order
//! - `queries` - recent queries and saved filters
//! - `controller` - per-table editor state machine
//! - `correction` - external query correction service
//! - `rows` - row fetching and in-memory filter evaluation
//! - `classify` - failure to displayable error mapping

pub mod classify;
pub mod columns;
pub mod controller;
pub mod correction;
pub mod error;
pub mod filters;
pub mod queries;
pub mod registry;
pub mod rows;

pub use classify::{ErrorInfo, ErrorSource, classify};
pub use columns::{Column, ColumnDef, ColumnLayout, ColumnSet, ColumnType};
pub use controller::{
    ErrorSlot, QueryStatus, ResolveOutcome, TableController, TableServices, TableSnapshot,
};
pub use correction::{CorrectionService, HttpCorrectionService};
pub use error::{ServiceError, TableError};
pub use queries::SavedFilter;
pub use registry::TableRegistry;
pub use rows::{MemoryRowSource, RowSource, Rows};
