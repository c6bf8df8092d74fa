//! SQL Adapter Library
//!
//! A uniform adapter over SQL databases (PostgreSQL, SQLite) with parameterized
//! CRUD and DDL operations, plus a factory that selects the adapter by type tag.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{DatabaseAdapter, DatabaseFactory};
pub use error::{DbError, DbResult};
