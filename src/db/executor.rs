//! Statement execution.
//!
//! Every statement runs on a single connection acquired from the pool for the
//! duration of the call:
//!
//! 1. acquire (a failure here propagates; nothing has to be released)
//! 2. bind parameters in order and run under the query timeout. On PostgreSQL,
//!    NULL and string parameters are first prepared untyped and then encoded
//!    as the types the server inferred for them
//! 3. release the connection back to the pool, whether the query succeeded,
//!    failed, or timed out
//!
//! Release happens by dropping the `PoolConnection`, which returns it to the
//! pool exactly once.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `postgres`: PostgreSQL statement execution
//! - `sqlite`: SQLite statement execution
//!
//! Each submodule provides identical functionality adapted to the database's type system.

use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, Row};
use std::time::{Duration, Instant};
use tokio::time::{error::Elapsed, timeout};
use tracing::debug;

// =============================================================================
// Common Helper Functions
// =============================================================================

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs() as u32)
}

/// Map a failed pool acquire, reporting the pool's configured acquire timeout.
fn acquire_error(err: sqlx::Error, acquire_timeout: Duration) -> DbError {
    match err {
        sqlx::Error::PoolTimedOut => timeout_error("connection pool acquire", acquire_timeout),
        other => DbError::from(other),
    }
}

/// Convert the outcome of a timed fetch into JSON rows.
fn finish<R: RowToJson>(
    result: Result<DbResult<Vec<R>>, Elapsed>,
    query_timeout: Duration,
    start: Instant,
) -> DbResult<Vec<Row>> {
    let rows = match result {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) => return Err(e),
        Err(_) => return Err(timeout_error("query execution", query_timeout)),
    };
    debug!(
        rows = rows.len(),
        execution_time_ms = start.elapsed().as_millis() as u64,
        "Statement completed"
    );
    Ok(rows.iter().map(RowToJson::to_json_map).collect())
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.

pub(crate) mod postgres {
    use super::*;
    use crate::db::params::{bind_postgres_param, declared_postgres_type, is_untyped};
    use sqlx::postgres::{PgConnection, PgTypeInfo};
    use sqlx::{Either, Executor, PgPool, Statement as _, Type};

    /// SQLSTATE 42P18: the server could not infer a parameter's type.
    const INDETERMINATE_DATATYPE: &str = "42P18";

    pub async fn run(
        pool: &PgPool,
        sql: &str,
        params: &[QueryParam],
        query_timeout: Duration,
    ) -> DbResult<Vec<Row>> {
        let start = Instant::now();
        debug!(
            sql = %sql,
            params = params.len(),
            timeout_secs = query_timeout.as_secs(),
            "Executing statement"
        );

        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| acquire_error(e, pool.options().get_acquire_timeout()))?;

        let result = timeout(query_timeout, async {
            // When params is empty, use the simple query protocol so DDL and
            // multi-statement scripts run unprepared
            if params.is_empty() {
                return (&mut *conn).fetch_all(sql).await.map_err(DbError::from);
            }
            let inferred = infer_parameter_types(&mut conn, sql, params).await?;
            let mut query = sqlx::query(sql);
            for (i, (param, ty)) in params.iter().zip(&inferred).enumerate() {
                query = bind_postgres_param(query, param, i + 1, ty.as_ref())?;
            }
            query.fetch_all(&mut *conn).await.map_err(DbError::from)
        })
        .await;

        drop(conn);
        debug!("Connection released");

        finish(result, query_timeout, start)
    }

    /// Prepare the statement with NULL and string parameters left untyped and
    /// return the types the server inferred for them (`None` for typed ones).
    ///
    /// The prepared statement is cached on the connection, so the following
    /// execution reuses it with these types.
    async fn infer_parameter_types(
        conn: &mut PgConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Option<PgTypeInfo>>> {
        if !params.iter().any(is_untyped) {
            return Ok(vec![None; params.len()]);
        }
        let declared: Vec<PgTypeInfo> = params.iter().map(declared_postgres_type).collect();

        let statement = match (&mut *conn).prepare_with(sql, &declared).await {
            Ok(statement) => statement,
            // e.g. `SELECT $1`: nothing constrains the type, so send text
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(INDETERMINATE_DATATYPE) => {
                debug!("Parameter types not inferable, binding untyped values as text");
                let text = <String as Type<sqlx::Postgres>>::type_info();
                return Ok(params
                    .iter()
                    .map(|p| is_untyped(p).then(|| text.clone()))
                    .collect());
            }
            Err(e) => return Err(e.into()),
        };

        let inferred: &[PgTypeInfo] = match statement.parameters() {
            Some(Either::Left(types)) => types,
            _ => &[],
        };
        Ok(params
            .iter()
            .enumerate()
            .map(|(i, p)| if is_untyped(p) { inferred.get(i).cloned() } else { None })
            .collect())
    }
}

pub(crate) mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::{Executor, SqlitePool};

    pub async fn run(
        pool: &SqlitePool,
        sql: &str,
        params: &[QueryParam],
        query_timeout: Duration,
    ) -> DbResult<Vec<Row>> {
        let start = Instant::now();
        debug!(
            sql = %sql,
            params = params.len(),
            timeout_secs = query_timeout.as_secs(),
            "Executing statement"
        );

        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| acquire_error(e, pool.options().get_acquire_timeout()))?;

        let result = if params.is_empty() {
            timeout(query_timeout, (&mut *conn).fetch_all(sql)).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            timeout(query_timeout, query.fetch_all(&mut *conn)).await
        }
        .map(|r| r.map_err(DbError::from));

        drop(conn);
        debug!("Connection released");

        finish(result, query_timeout, start)
    }
}
