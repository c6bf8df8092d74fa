//! Command-line operations.
//!
//! Each subcommand maps onto one adapter operation. Structured arguments
//! (conditions, data, params, column definitions) are taken as JSON; object
//! key order is kept, so it decides placeholder order.

use crate::db::DatabaseAdapter;
use crate::error::DbResult;
use crate::models::{ColumnDefinition, Fields, FindOptions, QueryParam};
use clap::Subcommand;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use tracing::info;

fn parse_json<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Select rows matching all conditions
    Find {
        table: String,
        /// Conditions as a JSON object, e.g. '{"id": 5}'
        #[arg(long = "where", value_parser = parse_json::<Fields>, default_value = "{}")]
        conditions: Fields,
        /// Ordering, e.g. "name DESC, id"
        #[arg(long)]
        order_by: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Insert one row and print it
    Create {
        table: String,
        /// Column values as a JSON object
        #[arg(long, value_parser = parse_json::<Fields>)]
        data: Fields,
    },
    /// Update rows matching all conditions (every row when none are given)
    Update {
        table: String,
        /// New column values as a JSON object
        #[arg(long = "set", value_parser = parse_json::<Fields>)]
        data: Fields,
        #[arg(long = "where", value_parser = parse_json::<Fields>, default_value = "{}")]
        conditions: Fields,
    },
    /// Delete rows matching all conditions (every row when none are given)
    Delete {
        table: String,
        #[arg(long = "where", value_parser = parse_json::<Fields>, default_value = "{}")]
        conditions: Fields,
    },
    /// Run a raw SQL statement
    Execute {
        sql: String,
        /// Positional parameters as a JSON array
        #[arg(long, value_parser = parse_json::<Vec<QueryParam>>, default_value = "[]")]
        params: ::std::vec::Vec<QueryParam>,
    },
    /// Create a table from a JSON array of column definitions
    CreateTable {
        table: String,
        /// e.g. '[{"name": "id", "type": "integer", "primary_key": true}]'
        #[arg(long, value_parser = parse_json::<Vec<ColumnDefinition>>)]
        columns: ::std::vec::Vec<ColumnDefinition>,
    },
    /// Drop a table
    DropTable { table: String },
    /// Add a column from a JSON column definition
    AddColumn {
        table: String,
        #[arg(long, value_parser = parse_json::<ColumnDefinition>)]
        column: ColumnDefinition,
    },
    /// Drop a column
    DropColumn { table: String, column: String },
}

impl Command {
    /// Run the command and return its JSON output.
    pub async fn run(self, adapter: &dyn DatabaseAdapter) -> DbResult<JsonValue> {
        match self {
            Command::Find {
                table,
                conditions,
                order_by,
                limit,
            } => {
                let options = FindOptions { limit, order_by };
                let rows = adapter.find(&table, &conditions, &options).await?;
                Ok(json!(rows))
            }
            Command::Create { table, data } => {
                let row = adapter.create(&table, &data).await?;
                Ok(JsonValue::Object(row))
            }
            Command::Update {
                table,
                data,
                conditions,
            } => {
                let rows = adapter.update(&table, &data, &conditions).await?;
                info!(table = %table, rows = rows.len(), "Rows updated");
                Ok(json!(rows))
            }
            Command::Delete { table, conditions } => {
                let rows = adapter.delete(&table, &conditions).await?;
                info!(table = %table, rows = rows.len(), "Rows deleted");
                Ok(json!(rows))
            }
            Command::Execute { sql, params } => {
                let rows = adapter.execute(&sql, &params).await?;
                Ok(json!(rows))
            }
            Command::CreateTable { table, columns } => {
                adapter.create_table(&table, &columns).await?;
                Ok(json!({ "created": table }))
            }
            Command::DropTable { table } => {
                adapter.delete_table(&table).await?;
                Ok(json!({ "dropped": table }))
            }
            Command::AddColumn { table, column } => {
                adapter.add_column(&table, &column).await?;
                Ok(json!({ "table": table, "added": column.name }))
            }
            Command::DropColumn { table, column } => {
                adapter.drop_column(&table, &column).await?;
                Ok(json!({ "table": table, "dropped": column }))
            }
        }
    }
}
