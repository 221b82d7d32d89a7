//! API route handlers

pub mod health;
pub mod shell;
pub mod tables;
