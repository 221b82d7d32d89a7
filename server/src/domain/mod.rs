//! Domain logic
//!
//! - `table` - query editor and grid state for mounted data tables

pub mod table;
