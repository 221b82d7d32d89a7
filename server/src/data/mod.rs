//! Data layer

pub mod persist;
