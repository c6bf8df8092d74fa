//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - SQL rendering with dialect-specific placeholders
//! - The adapter trait and its PostgreSQL and SQLite implementations
//! - Adapter selection by type tag
//! - Connection pool construction
//! - Statement execution and row decoding

pub mod adapter;
pub mod builder;
pub mod executor;
pub mod factory;
pub mod params;
pub mod pool;
pub mod postgres;
pub mod sqlite;
pub mod types;

pub use adapter::DatabaseAdapter;
pub use builder::{Dialect, QueryBuilder, Statement};
pub use factory::DatabaseFactory;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;
