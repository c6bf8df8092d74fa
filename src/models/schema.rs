//! Schema-related data models.
//!
//! This module defines the column descriptors accepted by the DDL helpers.

use serde::{Deserialize, Serialize};

fn default_nullable() -> bool {
    true
}

/// A column as supplied to `create_table` or `add_column`.
///
/// `data_type` and `default` are rendered verbatim; only `name` is checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// Full type (e.g., `varchar(30)`, `integer`)
    #[serde(rename = "type", alias = "data_type")]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Default expression, e.g. `0` or `CURRENT_TIMESTAMP`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnDefinition {
    /// Create a new nullable column definition.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            primary_key: false,
        }
    }

    /// Set whether the column accepts NULL.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set the default expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set whether this is a primary key column.
    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.primary_key = is_pk;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_definition_deserialize_defaults() {
        let col: ColumnDefinition =
            serde_json::from_str(r#"{"name": "email", "type": "text"}"#).unwrap();
        assert_eq!(col, ColumnDefinition::new("email", "text"));
        assert!(col.nullable);
        assert!(!col.primary_key);
    }

    #[test]
    fn test_column_definition_deserialize_full() {
        let col: ColumnDefinition = serde_json::from_str(
            r#"{"name": "age", "data_type": "integer", "nullable": false, "default": "0"}"#,
        )
        .unwrap();
        assert_eq!(
            col,
            ColumnDefinition::new("age", "integer")
                .with_nullable(false)
                .with_default("0")
        );
    }
}
