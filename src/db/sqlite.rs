//! SQLite adapter.

use crate::db::adapter::DatabaseAdapter;
use crate::db::executor;
use crate::db::pool::create_sqlite_pool;
use crate::error::DbResult;
use crate::models::{ConnectionConfig, DatabaseType, QueryParam, Row};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::info;

/// Adapter over a SQLite connection pool. Renders `?n` placeholders.
///
/// `RETURNING` requires SQLite 3.35 or newer.
#[derive(Debug, Clone)]
pub struct SqliteAdapter {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl SqliteAdapter {
    /// Open the database file (created if missing) using the given configuration.
    pub async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let pool = create_sqlite_pool(config).await?;
        Ok(Self::from_pool(pool, config.query_timeout()))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    async fn execute(&self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Row>> {
        executor::sqlite::run(&self.pool, sql, params, self.query_timeout).await
    }

    async fn shutdown(&self) {
        self.pool.close().await;
        info!("SQLite pool closed");
    }
}
