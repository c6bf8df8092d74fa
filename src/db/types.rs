//! Database-agnostic type mappings.
//!
//! This module converts driver rows into plain JSON rows.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! SQLite columns are classified by the stored value's runtime type, since
//! declared types are advisory there and absent for `RETURNING` expressions.

use crate::models::{DatabaseType, Row};
use serde_json::Value as JsonValue;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    TimeTz,
    Interval,
    Array,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // sqlx reports arrays as "TEXT[]"; the catalog spells them "_text"
    if lower.ends_with("[]") || lower.starts_with('_') {
        return TypeCategory::Array;
    }

    // Temporal types first: "interval" and "point" would otherwise match "int"
    match lower.as_str() {
        "timestamptz" | "timestamp with time zone" => return TypeCategory::TimestampTz,
        "timestamp" | "timestamp without time zone" => return TypeCategory::Timestamp,
        "date" => return TypeCategory::Date,
        "time" | "time without time zone" => return TypeCategory::Time,
        "timetz" | "time with time zone" => return TypeCategory::TimeTz,
        "interval" => return TypeCategory::Interval,
        "point" => return TypeCategory::Unknown,
        _ => {}
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower == "text" || lower.contains("char") {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawDecimal(value.as_str()?.to_string())),
            PgValueFormat::Binary => numeric_to_string(value.as_bytes()?).map(RawDecimal),
        }
    }
}

/// Render the binary NUMERIC wire format (base-10000 digit groups) as text.
fn numeric_to_string(bytes: &[u8]) -> Result<String, sqlx::error::BoxDynError> {
    let read = |offset: usize| -> Result<i16, sqlx::error::BoxDynError> {
        bytes
            .get(offset..offset + 2)
            .map(|b| i16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated NUMERIC value".into())
    };

    let ndigits = read(0)?.max(0) as usize;
    let weight = read(2)? as i32;
    let sign = read(4)? as u16;
    let dscale = read(6)?.max(0) as usize;
    match sign {
        0xC000 => return Ok("NaN".to_string()),
        0xD000 => return Ok("Infinity".to_string()),
        0xF000 => return Ok("-Infinity".to_string()),
        _ => {}
    }
    let digits = (0..ndigits)
        .map(|i| read(8 + 2 * i))
        .collect::<Result<Vec<_>, _>>()?;
    let digit = |i: i32| -> i16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit(0).to_string());
        for i in 1..=weight {
            out.push_str(&format!("{:04}", digit(i)));
        }
    }
    if dscale > 0 {
        let mut frac = String::new();
        let mut i = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", digit(i)));
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Ok(out)
}

/// Render an interval the way PostgreSQL prints it, e.g. `1 year 2 mons 3 days 04:05:06`.
pub fn interval_to_string(interval: &PgInterval) -> String {
    fn unit(n: i32, name: &str) -> String {
        format!("{} {}{}", n, name, if n.abs() == 1 { "" } else { "s" })
    }

    let mut parts = Vec::new();
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year"));
    }
    if months != 0 {
        parts.push(unit(months, "mon"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days, "day"));
    }
    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut clock = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let frac = micros % 1_000_000;
        if frac != 0 {
            clock.push_str(format!(".{:06}", frac).trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Encode binary column data as a base64 JSON string.
pub fn binary_to_json(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    JsonValue::String(STANDARD.encode(bytes))
}

fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> Row;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let value = postgres::decode_column(self, idx, col.type_info().name());
                (col.name().to_string(), value)
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let value = sqlite::decode_column(self, idx, col.type_info().name());
                (col.name().to_string(), value)
            })
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod postgres {
    use super::*;

    /// Decode one column. Values whose type has no JSON mapping fall back to
    /// their raw representation instead of being dropped.
    pub fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> JsonValue {
        match row.try_get_raw(idx) {
            Ok(raw) if !raw.is_null() => {}
            _ => return JsonValue::Null,
        }
        let category = categorize_type(type_name, DatabaseType::PostgreSQL);
        decode_typed(row, idx, type_name, category).unwrap_or_else(|| decode_raw(row, idx))
    }

    fn decode_typed(
        row: &PgRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Option<JsonValue> {
        match category {
            TypeCategory::Decimal => get::<RawDecimal>(row, idx).map(|v| JsonValue::String(v.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => get::<bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => get::<Vec<u8>>(row, idx).map(|v| binary_to_json(&v)),
            TypeCategory::Json => get::<JsonValue>(row, idx),
            TypeCategory::Uuid => {
                get::<uuid::Uuid>(row, idx).map(|v| JsonValue::String(v.to_string()))
            }
            TypeCategory::TimestampTz => get::<chrono::DateTime<chrono::Utc>>(row, idx)
                .map(|v| JsonValue::String(v.to_rfc3339())),
            TypeCategory::Timestamp => get::<chrono::NaiveDateTime>(row, idx)
                .map(|v| JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
            TypeCategory::Date => {
                get::<chrono::NaiveDate>(row, idx).map(|v| JsonValue::String(v.to_string()))
            }
            TypeCategory::Time => {
                get::<chrono::NaiveTime>(row, idx).map(|v| JsonValue::String(v.to_string()))
            }
            TypeCategory::TimeTz => get::<
                sqlx::postgres::types::PgTimeTz<chrono::NaiveTime, chrono::FixedOffset>,
            >(row, idx)
            .map(|v| JsonValue::String(format!("{}{}", v.time, v.offset))),
            TypeCategory::Interval => {
                get::<PgInterval>(row, idx).map(|v| JsonValue::String(interval_to_string(&v)))
            }
            TypeCategory::Array => decode_array(row, idx, type_name),
            TypeCategory::Text | TypeCategory::Unknown => {
                get::<String>(row, idx).map(JsonValue::String)
            }
        }
    }

    /// Decode a non-null column, returning None when the Rust type does not fit.
    fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
    where
        T: Decode<'r, sqlx::Postgres> + Type<sqlx::Postgres>,
    {
        match row.try_get::<Option<T>, _>(idx) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(column = idx, error = %e, "Typed decode failed, using raw value");
                None
            }
        }
    }

    /// Text-format values are returned verbatim; binary values that are not
    /// printable text are base64-encoded.
    fn decode_raw(row: &PgRow, idx: usize) -> JsonValue {
        let Ok(raw) = row.try_get_raw(idx) else {
            return JsonValue::Null;
        };
        let Ok(bytes) = raw.as_bytes() else {
            return JsonValue::Null;
        };
        match std::str::from_utf8(bytes) {
            Ok(s) if !s.chars().any(char::is_control) => JsonValue::String(s.to_string()),
            _ => binary_to_json(bytes),
        }
    }

    fn list<T>(values: Vec<Option<T>>, f: impl Fn(T) -> JsonValue) -> JsonValue {
        JsonValue::Array(
            values
                .into_iter()
                .map(|v| v.map_or(JsonValue::Null, &f))
                .collect(),
        )
    }

    fn decode_array(row: &PgRow, idx: usize, type_name: &str) -> Option<JsonValue> {
        let element = type_name.trim_end_matches("[]").trim_start_matches('_');
        match categorize_type(element, DatabaseType::PostgreSQL) {
            TypeCategory::Integer => get::<Vec<Option<i16>>>(row, idx)
                .map(|v| list(v, JsonValue::from))
                .or_else(|| get::<Vec<Option<i32>>>(row, idx).map(|v| list(v, JsonValue::from)))
                .or_else(|| get::<Vec<Option<i64>>>(row, idx).map(|v| list(v, JsonValue::from))),
            TypeCategory::Float => get::<Vec<Option<f64>>>(row, idx)
                .map(|v| list(v, float_to_json))
                .or_else(|| {
                    get::<Vec<Option<f32>>>(row, idx).map(|v| list(v, |x| float_to_json(x as f64)))
                }),
            TypeCategory::Boolean => {
                get::<Vec<Option<bool>>>(row, idx).map(|v| list(v, JsonValue::Bool))
            }
            TypeCategory::Text => {
                get::<Vec<Option<String>>>(row, idx).map(|v| list(v, JsonValue::String))
            }
            TypeCategory::Uuid => get::<Vec<Option<uuid::Uuid>>>(row, idx)
                .map(|v| list(v, |x| JsonValue::String(x.to_string()))),
            _ => None,
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Option<JsonValue> {
        get::<i16>(row, idx)
            .map(JsonValue::from)
            .or_else(|| get::<i32>(row, idx).map(JsonValue::from))
            .or_else(|| get::<i64>(row, idx).map(JsonValue::from))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Option<JsonValue> {
        get::<f64>(row, idx)
            .map(float_to_json)
            .or_else(|| get::<f32>(row, idx).map(|v| float_to_json(v as f64)))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, declared: &str) -> JsonValue {
        let runtime = match row.try_get_raw(idx) {
            Ok(raw) if !raw.is_null() => raw.type_info().name().to_string(),
            _ => return JsonValue::Null,
        };

        // Declared BOOLEAN/JSON columns are stored as INTEGER/TEXT
        let category = match categorize_type(declared, DatabaseType::SQLite) {
            c @ (TypeCategory::Boolean | TypeCategory::Json) => c,
            _ => categorize_type(&runtime, DatabaseType::SQLite),
        };

        match category {
            TypeCategory::Integer => row
                .try_get::<i64, _>(idx)
                .map_or(JsonValue::Null, |v| JsonValue::Number(v.into())),
            TypeCategory::Boolean => row
                .try_get::<bool, _>(idx)
                .map_or(JsonValue::Null, JsonValue::Bool),
            TypeCategory::Float | TypeCategory::Decimal => row
                .try_get::<f64, _>(idx)
                .map_or(JsonValue::Null, float_to_json),
            TypeCategory::Binary => row
                .try_get::<Vec<u8>, _>(idx)
                .map_or(JsonValue::Null, |v| binary_to_json(&v)),
            TypeCategory::Json => match row.try_get::<String, _>(idx) {
                Ok(s) => serde_json::from_str(&s).unwrap_or(JsonValue::String(s)),
                Err(_) => JsonValue::Null,
            },
            _ => row
                .try_get::<String, _>(idx)
                .map_or(JsonValue::Null, JsonValue::String),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT4", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INTEGER", DatabaseType::SQLite),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("SERIAL", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("NUMERIC", DatabaseType::PostgreSQL),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_temporal_not_integer() {
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            TypeCategory::TimestampTz
        );
        assert_eq!(
            categorize_type("DATE", DatabaseType::PostgreSQL),
            TypeCategory::Date
        );
        assert_eq!(
            categorize_type("INTERVAL", DatabaseType::PostgreSQL),
            TypeCategory::Interval
        );
        assert_eq!(
            categorize_type("TIMETZ", DatabaseType::PostgreSQL),
            TypeCategory::TimeTz
        );
    }

    #[test]
    fn test_categorize_type_misc() {
        assert_eq!(
            categorize_type("jsonb", DatabaseType::PostgreSQL),
            TypeCategory::Json
        );
        assert_eq!(
            categorize_type("uuid", DatabaseType::PostgreSQL),
            TypeCategory::Uuid
        );
        assert_eq!(
            categorize_type("BLOB", DatabaseType::SQLite),
            TypeCategory::Binary
        );
        assert_eq!(
            categorize_type("REAL", DatabaseType::SQLite),
            TypeCategory::Float
        );
        assert_eq!(
            categorize_type("varchar", DatabaseType::PostgreSQL),
            TypeCategory::Text
        );
    }

    #[test]
    fn test_binary_to_json() {
        assert_eq!(
            binary_to_json(b"hello world"),
            JsonValue::String("aGVsbG8gd29ybGQ=".to_string())
        );
        assert_eq!(binary_to_json(&[]), JsonValue::String(String::new()));
    }

    #[test]
    fn test_float_to_json_non_finite() {
        assert_eq!(float_to_json(1.5), serde_json::json!(1.5));
        assert_eq!(float_to_json(f64::NAN), JsonValue::String("NaN".to_string()));
    }

    #[test]
    fn test_categorize_type_arrays() {
        assert_eq!(
            categorize_type("TEXT[]", DatabaseType::PostgreSQL),
            TypeCategory::Array
        );
        assert_eq!(
            categorize_type("_int4", DatabaseType::PostgreSQL),
            TypeCategory::Array
        );
    }

    fn numeric(ndigits: i16, weight: i16, sign: u16, dscale: i16, digits: &[i16]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in [ndigits, weight, sign as i16, dscale] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        for d in digits {
            out.extend_from_slice(&d.to_be_bytes());
        }
        out
    }

    #[test]
    fn test_numeric_binary_to_string() {
        assert_eq!(numeric_to_string(&numeric(2, 0, 0, 2, &[123, 4500])).unwrap(), "123.45");
        assert_eq!(numeric_to_string(&numeric(1, -1, 0, 3, &[10])).unwrap(), "0.001");
        assert_eq!(numeric_to_string(&numeric(1, 2, 0, 0, &[1])).unwrap(), "100000000");
        assert_eq!(numeric_to_string(&numeric(1, 0, 0x4000, 1, &[7])).unwrap(), "-7.0");
        assert_eq!(numeric_to_string(&numeric(0, 0, 0, 0, &[])).unwrap(), "0");
        assert_eq!(numeric_to_string(&numeric(0, 0, 0xC000, 0, &[])).unwrap(), "NaN");
        assert!(numeric_to_string(&[0, 1]).is_err());
    }

    #[test]
    fn test_interval_to_string() {
        let iv = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };
        assert_eq!(interval_to_string(&iv(0, 1, 0)), "1 day");
        assert_eq!(
            interval_to_string(&iv(14, 3, 4 * 3_600_000_000 + 5 * 60_000_000 + 6_000_000)),
            "1 year 2 mons 3 days 04:05:06"
        );
        assert_eq!(interval_to_string(&iv(0, 0, 1_500_000)), "00:00:01.5");
        assert_eq!(interval_to_string(&iv(0, 0, -60_000_000)), "-00:01:00");
        assert_eq!(interval_to_string(&iv(0, 0, 0)), "00:00:00");
    }
}
