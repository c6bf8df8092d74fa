//! Integration tests for the SQLite adapter against a file database.
//!
//! Tests verify that:
//! - CRUD operations return the affected rows
//! - Empty conditions on update/delete affect every row
//! - Engine errors surface as database errors
//! - Connections are returned to the pool after failures

use serde_json::json;
use sql_adapter::config::PoolOptions;
use sql_adapter::db::{DatabaseAdapter, DatabaseFactory, SqliteAdapter};
use sql_adapter::error::DbError;
use sql_adapter::models::{ColumnDefinition, ConnectionConfig, Fields, FindOptions, QueryParam};
use tempfile::TempDir;

/// Create a SQLite database in a fresh directory with a `users` table.
async fn setup_db(pool_options: PoolOptions) -> (SqliteAdapter, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let config = ConnectionConfig::new(format!("sqlite:{}", db_path.display()))
        .with_pool_options(pool_options);
    let adapter = SqliteAdapter::connect(&config).await.unwrap();

    adapter
        .create_table(
            "users",
            &[
                ColumnDefinition::new("id", "INTEGER").with_primary_key(true),
                ColumnDefinition::new("name", "TEXT").with_nullable(false),
                ColumnDefinition::new("age", "INTEGER"),
            ],
        )
        .await
        .unwrap();

    (adapter, dir)
}

async fn seed(adapter: &SqliteAdapter, names: &[&str]) {
    for (i, name) in names.iter().enumerate() {
        adapter
            .create(
                "users",
                &Fields::new()
                    .with("name", *name)
                    .with("age", 20 + i as i64),
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_find_by_id_returns_matching_row() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;
    adapter
        .create("users", &Fields::new().with("id", 5).with("name", "a"))
        .await
        .unwrap();
    adapter
        .create("users", &Fields::new().with("id", 6).with("name", "b"))
        .await
        .unwrap();

    let rows = adapter
        .find("users", &Fields::new().with("id", 5), &FindOptions::default())
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], 5);
    assert_eq!(rows[0]["name"], "a");
    assert_eq!(rows[0]["age"], json!(null));
}

#[tokio::test]
async fn test_create_returns_inserted_row() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;

    let row = adapter
        .create("users", &Fields::new().with("name", "a"))
        .await
        .unwrap();

    assert_eq!(row["name"], "a");
    assert_eq!(row["id"], 1);
}

#[tokio::test]
async fn test_row_keys_follow_column_order() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;

    let row = adapter
        .create("users", &Fields::new().with("age", 3).with("name", "a"))
        .await
        .unwrap();

    let keys: Vec<&str> = row.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["id", "name", "age"]);
    assert_eq!(
        serde_json::to_string(&row).unwrap(),
        r#"{"id":1,"name":"a","age":3}"#
    );
}

#[tokio::test]
async fn test_find_with_order_and_limit() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;
    seed(&adapter, &["a", "b", "c"]).await;

    let rows = adapter
        .find(
            "users",
            &Fields::new(),
            &FindOptions::default().with_order_by("age DESC").with_limit(2),
        )
        .await
        .unwrap();

    let names: Vec<_> = rows.iter().map(|r| r["name"].clone()).collect();
    assert_eq!(names, vec![json!("c"), json!("b")]);
}

#[tokio::test]
async fn test_update_returns_changed_rows() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;
    seed(&adapter, &["a", "b"]).await;

    let rows = adapter
        .update(
            "users",
            &Fields::new().with("name", "z").with("age", 99),
            &Fields::new().with("name", "a"),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "z");
    assert_eq!(rows[0]["age"], 99);

    let untouched = adapter
        .find("users", &Fields::new().with("name", "b"), &FindOptions::default())
        .await
        .unwrap();
    assert_eq!(untouched[0]["age"], 21);
}

#[tokio::test]
async fn test_update_with_multiple_conditions() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;
    seed(&adapter, &["a", "a", "b"]).await;

    let rows = adapter
        .update(
            "users",
            &Fields::new().with("age", 1),
            &Fields::new().with("name", "a").with("age", 21),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], 2);
}

#[tokio::test]
async fn test_update_without_conditions_affects_every_row() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;
    seed(&adapter, &["a", "b", "c"]).await;

    let rows = adapter
        .update("users", &Fields::new().with("age", 0), &Fields::new())
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r["age"] == 0));
}

#[tokio::test]
async fn test_delete_returns_removed_rows() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;
    seed(&adapter, &["a", "b"]).await;

    let deleted = adapter
        .delete("users", &Fields::new().with("name", "a"))
        .await
        .unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0]["name"], "a");

    let remaining = adapter
        .find("users", &Fields::new(), &FindOptions::default())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn test_delete_without_conditions_clears_table() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;
    seed(&adapter, &["a", "b", "c"]).await;

    let deleted = adapter.delete("users", &Fields::new()).await.unwrap();
    assert_eq!(deleted.len(), 3);

    let remaining = adapter
        .find("users", &Fields::new(), &FindOptions::default())
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn test_create_with_empty_data_is_engine_error() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;

    let result = adapter.create("users", &Fields::new()).await;
    assert!(matches!(result, Err(DbError::Database { .. })));
}

#[tokio::test]
async fn test_missing_table_is_database_error() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;

    let err = adapter
        .find("no_such_table", &Fields::new(), &FindOptions::default())
        .await
        .unwrap_err();
    match err {
        DbError::Database { message, .. } => assert!(message.contains("no_such_table")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_not_null_violation_is_database_error() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;

    let result = adapter
        .create("users", &Fields::new().with("name", QueryParam::Null))
        .await;
    assert!(matches!(result, Err(DbError::Database { .. })));
}

#[tokio::test]
async fn test_connection_released_after_failure() {
    // A single connection: a leak on the error path would make the next
    // acquire time out.
    let (adapter, _dir) = setup_db(PoolOptions {
        max_connections: Some(1),
        min_connections: Some(1),
        acquire_timeout_secs: Some(2),
        ..Default::default()
    })
    .await;

    for _ in 0..5 {
        let failed = adapter.execute("SELECT * FROM missing", &[]).await;
        assert!(matches!(failed, Err(DbError::Database { .. })));

        let rows = adapter
            .execute("SELECT ?1 AS v", &[QueryParam::Int(1)])
            .await
            .unwrap();
        assert_eq!(rows[0]["v"], 1);
    }
}

#[tokio::test]
async fn test_acquire_timeout_reports_configured_duration() {
    let (adapter, _dir) = setup_db(PoolOptions {
        max_connections: Some(1),
        acquire_timeout_secs: Some(1),
        ..Default::default()
    })
    .await;

    let _held = adapter.pool().acquire().await.unwrap();
    let err = adapter.execute("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Timeout {
            elapsed_secs: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn test_schema_changes() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;

    adapter
        .add_column(
            "users",
            &ColumnDefinition::new("email", "TEXT").with_default("'none'"),
        )
        .await
        .unwrap();
    let row = adapter
        .create("users", &Fields::new().with("name", "a"))
        .await
        .unwrap();
    assert_eq!(row["email"], "none");

    adapter.drop_column("users", "email").await.unwrap();
    let row = adapter
        .create("users", &Fields::new().with("name", "b"))
        .await
        .unwrap();
    assert!(row.get("email").is_none());

    adapter.delete_table("users").await.unwrap();
    let result = adapter
        .find("users", &Fields::new(), &FindOptions::default())
        .await;
    assert!(matches!(result, Err(DbError::Database { .. })));
}

#[tokio::test]
async fn test_execute_raw_with_params() {
    let (adapter, _dir) = setup_db(PoolOptions::default()).await;
    seed(&adapter, &["a", "b", "c"]).await;

    let rows = adapter
        .execute(
            "SELECT name FROM users WHERE age > ?1 AND name != ?2 ORDER BY id",
            &[QueryParam::Int(20), QueryParam::String("c".into())],
        )
        .await
        .unwrap();

    assert_eq!(rows, vec![json!({"name": "b"}).as_object().cloned().unwrap()]);
}

#[tokio::test]
async fn test_factory_adapter_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?max_connections=2", dir.path().join("f.db").display());
    let config = ConnectionConfig::from_url(&url).unwrap();
    assert_eq!(config.pool_options.max_connections, Some(2));

    let adapter = DatabaseFactory::create_database("SQLite", &config)
        .await
        .unwrap();
    let rows = adapter.execute("SELECT 1 AS one", &[]).await.unwrap();
    assert_eq!(rows[0]["one"], 1);
    adapter.shutdown().await;
}
