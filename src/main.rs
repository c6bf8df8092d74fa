//! sql-adapter - Main entry point.
//!
//! Runs one CRUD or DDL operation against a SQL database (PostgreSQL, SQLite)
//! and prints the result as JSON on stdout. Logs go to stderr.

use sql_adapter::config::Config;
use sql_adapter::db::{DatabaseAdapter, DatabaseFactory};
use sql_adapter::error::DbResult;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn connect(config: &Config) -> DbResult<Box<dyn DatabaseAdapter>> {
    let conn_config = config.connection_config()?;
    match &config.db_type {
        Some(tag) => DatabaseFactory::create_database(tag, &conn_config).await,
        None => DatabaseFactory::from_url(&conn_config).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();
    init_tracing(&config);

    info!("Starting sql-adapter v{}", env!("CARGO_PKG_VERSION"));

    let adapter = match connect(&config).await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!(error = %e, suggestion = e.suggestion().unwrap_or_default(), "Connection failed");
            return Err(e.into());
        }
    };
    info!(database = %adapter.database_type(), "Connected");

    let result = config.command.clone().run(adapter.as_ref()).await;
    adapter.shutdown().await;

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(
                error = %e,
                sql_state = e.sql_state().unwrap_or_default(),
                suggestion = e.suggestion().unwrap_or_default(),
                "Operation failed"
            );
            Err(e.into())
        }
    }
}
