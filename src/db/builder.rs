//! SQL statement rendering.
//!
//! Turns structured CRUD and DDL requests into SQL text plus a positional
//! parameter list. Rendering is pure; nothing here touches a connection.
//!
//! # Placeholder contract
//!
//! Every [`Statement`] carries exactly one parameter per placeholder, numbered
//! from 1 in the order the values were bound. For `UPDATE`, the `SET` values are
//! bound first and the `WHERE` values continue the same sequence.
//!
//! # Identifiers
//!
//! Table and column names are spliced into the SQL text, so they are checked
//! against an allow-list first. Column types and default expressions are
//! passed through verbatim.

use crate::error::{DbError, DbResult};
use crate::models::{ColumnDefinition, DatabaseType, Fields, FindOptions, QueryParam};

/// Placeholder style and SQL flavor of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `$1`, `$2`, ...
    Postgres,
    /// `?1`, `?2`, ...
    Sqlite,
}

impl Dialect {
    /// Render the placeholder for the 1-based parameter index `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => format!("?{n}"),
        }
    }
}

impl From<DatabaseType> for Dialect {
    fn from(db_type: DatabaseType) -> Self {
        match db_type {
            DatabaseType::PostgreSQL => Dialect::Postgres,
            DatabaseType::SQLite => Dialect::Sqlite,
        }
    }
}

/// Rendered SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl Statement {
    /// A statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Accumulates bound values and hands out the matching placeholders.
struct Binder {
    dialect: Dialect,
    params: Vec<QueryParam>,
}

impl Binder {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: &QueryParam) -> String {
        self.params.push(value.clone());
        self.dialect.placeholder(self.params.len())
    }

    /// Render `column = <placeholder>` for every entry, in order.
    fn assignments(&mut self, fields: &Fields) -> DbResult<Vec<String>> {
        fields
            .iter()
            .map(|(column, value)| {
                validate_identifier(column)?;
                Ok(format!("{} = {}", column, self.bind(value)))
            })
            .collect()
    }

    /// Render ` WHERE a = $n AND b = $n+1`, or nothing for empty conditions.
    fn where_clause(&mut self, conditions: &Fields) -> DbResult<String> {
        if conditions.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(" WHERE {}", self.assignments(conditions)?.join(" AND ")))
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }
}

/// Renders statements for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    dialect: Dialect,
}

impl QueryBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// `SELECT * FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT n]`
    pub fn select(
        &self,
        table: &str,
        conditions: &Fields,
        options: &FindOptions,
    ) -> DbResult<Statement> {
        validate_table(table)?;
        let mut binder = Binder::new(self.dialect);
        let mut sql = format!("SELECT * FROM {}", table);
        sql.push_str(&binder.where_clause(conditions)?);
        if let Some(order_by) = &options.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(&render_order_by(order_by)?);
        }
        if let Some(limit) = options.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        Ok(binder.finish(sql))
    }

    /// `INSERT INTO <table> (cols) VALUES (placeholders) RETURNING *`
    ///
    /// Empty `data` renders `() VALUES ()`, which the engine rejects.
    pub fn insert(&self, table: &str, data: &Fields) -> DbResult<Statement> {
        validate_table(table)?;
        let mut binder = Binder::new(self.dialect);
        let mut columns = Vec::with_capacity(data.len());
        let mut placeholders = Vec::with_capacity(data.len());
        for (column, value) in data.iter() {
            validate_identifier(column)?;
            columns.push(column);
            placeholders.push(binder.bind(value));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(binder.finish(sql))
    }

    /// `UPDATE <table> SET ... [WHERE ...] RETURNING *`
    ///
    /// Empty `conditions` omits the WHERE clause and touches every row.
    pub fn update(&self, table: &str, data: &Fields, conditions: &Fields) -> DbResult<Statement> {
        validate_table(table)?;
        let mut binder = Binder::new(self.dialect);
        let sets = binder.assignments(data)?;
        let mut sql = format!("UPDATE {} SET {}", table, sets.join(", "));
        sql.push_str(&binder.where_clause(conditions)?);
        sql.push_str(" RETURNING *");
        Ok(binder.finish(sql))
    }

    /// `DELETE FROM <table> [WHERE ...] RETURNING *`
    ///
    /// Empty `conditions` omits the WHERE clause and removes every row.
    pub fn delete(&self, table: &str, conditions: &Fields) -> DbResult<Statement> {
        validate_table(table)?;
        let mut binder = Binder::new(self.dialect);
        let mut sql = format!("DELETE FROM {}", table);
        sql.push_str(&binder.where_clause(conditions)?);
        sql.push_str(" RETURNING *");
        Ok(binder.finish(sql))
    }

    /// `CREATE TABLE <table> (<column definitions>)`
    pub fn create_table(&self, table: &str, columns: &[ColumnDefinition]) -> DbResult<Statement> {
        validate_table(table)?;
        let definitions = columns
            .iter()
            .map(column_definition_sql)
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Statement::raw(format!(
            "CREATE TABLE {} ({})",
            table,
            definitions.join(", ")
        )))
    }

    /// `DROP TABLE <table>`
    pub fn drop_table(&self, table: &str) -> DbResult<Statement> {
        validate_table(table)?;
        Ok(Statement::raw(format!("DROP TABLE {}", table)))
    }

    /// `ALTER TABLE <table> ADD COLUMN <column definition>`
    pub fn add_column(&self, table: &str, column: &ColumnDefinition) -> DbResult<Statement> {
        validate_table(table)?;
        Ok(Statement::raw(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            table,
            column_definition_sql(column)?
        )))
    }

    /// `ALTER TABLE <table> DROP COLUMN <column>`
    pub fn drop_column(&self, table: &str, column: &str) -> DbResult<Statement> {
        validate_table(table)?;
        validate_identifier(column)?;
        Ok(Statement::raw(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            table, column
        )))
    }
}

/// Check a bare identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> DbResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DbError::invalid_input(format!(
            "Invalid identifier '{}': use letters, digits and underscores, not starting with a digit",
            name
        )))
    }
}

/// Check a table name, allowing one `schema.table` qualifier.
pub fn validate_table(name: &str) -> DbResult<()> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(DbError::invalid_input(format!(
            "Invalid table name '{}': at most one schema qualifier is allowed",
            name
        )));
    }
    parts.into_iter().try_for_each(validate_identifier)
}

/// Normalize `col [ASC|DESC], ...` into canonical spacing and upper-case direction.
fn render_order_by(order_by: &str) -> DbResult<String> {
    let terms = order_by
        .split(',')
        .map(|term| {
            let mut words = term.split_whitespace();
            let column = words
                .next()
                .ok_or_else(|| DbError::invalid_input("Empty ORDER BY term"))?;
            validate_identifier(column)?;
            let direction = match words.next() {
                None => None,
                Some(d) if d.eq_ignore_ascii_case("asc") => Some("ASC"),
                Some(d) if d.eq_ignore_ascii_case("desc") => Some("DESC"),
                Some(other) => {
                    return Err(DbError::invalid_input(format!(
                        "Invalid ORDER BY direction '{}'",
                        other
                    )));
                }
            };
            if words.next().is_some() {
                return Err(DbError::invalid_input(format!(
                    "Invalid ORDER BY term '{}'",
                    term.trim()
                )));
            }
            Ok(match direction {
                Some(d) => format!("{} {}", column, d),
                None => column.to_string(),
            })
        })
        .collect::<DbResult<Vec<_>>>()?;
    Ok(terms.join(", "))
}

/// Render `name type[ PRIMARY KEY][ NOT NULL][ DEFAULT expr]`.
fn column_definition_sql(column: &ColumnDefinition) -> DbResult<String> {
    validate_identifier(&column.name)?;
    let data_type = column.data_type.trim();
    if data_type.is_empty() {
        return Err(DbError::invalid_input(format!(
            "Column '{}' has no type",
            column.name
        )));
    }
    let mut sql = format!("{} {}", column.name, data_type);
    if column.primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    Ok(sql)
}
