//! Data models for the SQL adapter.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionConfig, DatabaseType};
pub use query::{Fields, FindOptions, QueryParam, Row};
pub use schema::ColumnDefinition;
