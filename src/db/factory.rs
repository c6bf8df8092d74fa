//! Adapter selection by database type tag.

use crate::db::adapter::DatabaseAdapter;
use crate::db::postgres::PostgresAdapter;
use crate::db::sqlite::SqliteAdapter;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, DatabaseType};
use tracing::info;

/// Constructs the adapter matching a type tag.
///
/// Supported tags (case-insensitive): `postgresql`, `postgres`, `pg`,
/// `sqlite`, `sqlite3`. Any other tag, `mysql` included, is rejected before a
/// connection is attempted.
pub struct DatabaseFactory;

impl DatabaseFactory {
    /// Tags accepted by [`DatabaseFactory::create_database`].
    pub fn supported_types() -> &'static [&'static str] {
        DatabaseType::TAGS
    }

    /// Resolve a tag without connecting.
    pub fn resolve(db_type: &str) -> DbResult<DatabaseType> {
        DatabaseType::from_tag(db_type).ok_or_else(|| DbError::unsupported_type(db_type))
    }

    /// Construct and connect the adapter for `db_type`.
    pub async fn create_database(
        db_type: &str,
        config: &ConnectionConfig,
    ) -> DbResult<Box<dyn DatabaseAdapter>> {
        let kind = Self::resolve(db_type)?;
        info!(db_type = %kind, "Creating database adapter");

        let adapter: Box<dyn DatabaseAdapter> = match kind {
            DatabaseType::PostgreSQL => Box::new(PostgresAdapter::connect(config).await?),
            DatabaseType::SQLite => Box::new(SqliteAdapter::connect(config).await?),
        };
        Ok(adapter)
    }

    /// Construct the adapter whose type is implied by the connection string scheme.
    pub async fn from_url(config: &ConnectionConfig) -> DbResult<Box<dyn DatabaseAdapter>> {
        let kind = DatabaseType::from_connection_string(&config.connection_string)
            .ok_or_else(|| {
                let scheme = config
                    .connection_string
                    .split(':')
                    .next()
                    .unwrap_or_default();
                DbError::unsupported_type(scheme)
            })?;
        Self::create_database(kind.display_name(), config).await
    }
}
