//! PostgreSQL adapter.

use crate::db::adapter::DatabaseAdapter;
use crate::db::executor;
use crate::db::pool::create_postgres_pool;
use crate::error::DbResult;
use crate::models::{ConnectionConfig, DatabaseType, QueryParam, Row};
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Adapter over a PostgreSQL connection pool. Renders `$n` placeholders.
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresAdapter {
    /// Connect using the given configuration.
    pub async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let pool = create_postgres_pool(config).await?;
        Ok(Self::from_pool(pool, config.query_timeout()))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    async fn execute(&self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Row>> {
        executor::postgres::run(&self.pool, sql, params, self.query_timeout).await
    }

    async fn shutdown(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }
}
