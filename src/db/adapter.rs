//! The adapter interface shared by every backend.
//!
//! A backend only supplies [`DatabaseAdapter::execute`], its type and
//! [`DatabaseAdapter::shutdown`]; the CRUD and DDL operations are rendered by
//! the [`QueryBuilder`] for the backend's dialect and run through `execute`.

use crate::db::builder::{QueryBuilder, Statement};
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDefinition, DatabaseType, Fields, FindOptions, QueryParam, Row};
use async_trait::async_trait;
use tracing::warn;

#[async_trait]
pub trait DatabaseAdapter: Send + Sync + std::fmt::Debug {
    /// The backend this adapter talks to.
    fn database_type(&self) -> DatabaseType;

    /// Run one statement on a pooled connection and return its rows.
    ///
    /// The connection is returned to the pool on every exit path.
    async fn execute(&self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Row>>;

    /// Close the pool. No further calls are expected afterwards; any that are
    /// made fail with a connection error.
    async fn shutdown(&self);

    fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(self.database_type().into())
    }

    async fn run(&self, statement: &Statement) -> DbResult<Vec<Row>> {
        self.execute(&statement.sql, &statement.params).await
    }

    /// Select rows matching all `conditions`.
    async fn find(
        &self,
        table: &str,
        conditions: &Fields,
        options: &FindOptions,
    ) -> DbResult<Vec<Row>> {
        let statement = self.query_builder().select(table, conditions, options)?;
        self.run(&statement).await
    }

    /// Insert one row and return it as stored.
    async fn create(&self, table: &str, data: &Fields) -> DbResult<Row> {
        let statement = self.query_builder().insert(table, data)?;
        self.run(&statement)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::internal(format!("INSERT into {} returned no row", table)))
    }

    /// Update rows matching all `conditions` and return them.
    ///
    /// Empty `conditions` updates every row in the table.
    async fn update(&self, table: &str, data: &Fields, conditions: &Fields) -> DbResult<Vec<Row>> {
        if conditions.is_empty() {
            warn!(table = %table, "UPDATE without conditions affects every row");
        }
        let statement = self.query_builder().update(table, data, conditions)?;
        self.run(&statement).await
    }

    /// Delete rows matching all `conditions` and return them.
    ///
    /// Empty `conditions` deletes every row in the table.
    async fn delete(&self, table: &str, conditions: &Fields) -> DbResult<Vec<Row>> {
        if conditions.is_empty() {
            warn!(table = %table, "DELETE without conditions affects every row");
        }
        let statement = self.query_builder().delete(table, conditions)?;
        self.run(&statement).await
    }

    async fn create_table(&self, table: &str, columns: &[ColumnDefinition]) -> DbResult<()> {
        let statement = self.query_builder().create_table(table, columns)?;
        self.run(&statement).await.map(|_| ())
    }

    async fn delete_table(&self, table: &str) -> DbResult<()> {
        let statement = self.query_builder().drop_table(table)?;
        self.run(&statement).await.map(|_| ())
    }

    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> DbResult<()> {
        let statement = self.query_builder().add_column(table, column)?;
        self.run(&statement).await.map(|_| ())
    }

    async fn drop_column(&self, table: &str, column: &str) -> DbResult<()> {
        let statement = self.query_builder().drop_column(table, column)?;
        self.run(&statement).await.map(|_| ())
    }
}
