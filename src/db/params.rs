//! Parameter binding utilities for database queries.
//!
//! This module provides functions to bind `QueryParam` values to database-specific
//! query objects, in the order the query builder produced them.
//!
//! PostgreSQL receives parameters in binary format, so every value has to be
//! encoded as the exact type of its placeholder. Numbers, booleans and JSON are
//! declared with their natural types. NULLs and strings are left untyped when
//! the statement is prepared; the server infers their types from context and
//! [`bind_postgres_param`] encodes them to match.

use crate::db::types::{TypeCategory, categorize_type};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, QueryParam};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgTypeInfo, PgTypeKind};
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{Encode, Postgres, Sqlite, Type, TypeInfo};

/// Type declared for a placeholder when the statement is prepared.
///
/// NULLs and strings are declared with OID 0 (unspecified).
pub(crate) fn declared_postgres_type(param: &QueryParam) -> PgTypeInfo {
    match param {
        QueryParam::Null | QueryParam::String(_) => PgTypeInfo::with_oid(Oid(0)),
        QueryParam::Bool(_) => <bool as Type<Postgres>>::type_info(),
        QueryParam::Int(_) => <i64 as Type<Postgres>>::type_info(),
        QueryParam::Float(_) => <f64 as Type<Postgres>>::type_info(),
        QueryParam::Json(_) => <Json<JsonValue> as Type<Postgres>>::type_info(),
    }
}

/// Whether the server decides this parameter's type.
pub(crate) fn is_untyped(param: &QueryParam) -> bool {
    matches!(param, QueryParam::Null | QueryParam::String(_))
}

/// Bind a parameter to a PostgreSQL query.
///
/// `inferred` is the type the server resolved for an untyped parameter; it is
/// `None` for typed parameters.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
    position: usize,
    inferred: Option<&PgTypeInfo>,
) -> DbResult<sqlx::query::Query<'q, Postgres, PgArguments>> {
    let query = match (param, inferred) {
        (QueryParam::Null, Some(ty)) => query.bind(InferredParam::null(ty.clone())),
        (QueryParam::String(s), Some(ty)) => query.bind(InferredParam::from_text(s, ty, position)?),
        (QueryParam::Null, None) => query.bind(None::<String>),
        (QueryParam::Bool(v), _) => query.bind(*v),
        (QueryParam::Int(v), _) => query.bind(*v),
        (QueryParam::Float(v), _) => query.bind(*v),
        (QueryParam::String(v), None) => query.bind(v.as_str()),
        (QueryParam::Json(v), _) => query.bind(Json(v)),
    };
    Ok(query)
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        // SQLite doesn't have native JSON type, store as string
        QueryParam::Json(v) => query.bind(v.to_string()),
    }
}

// =============================================================================
// Server-Inferred Parameters
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum InferredValue {
    Null,
    Text(String),
    /// Serialized JSON; `true` when the target is JSONB
    Json(String, bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Bool(bool),
    Uuid(uuid::Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

/// A NULL or string parameter encoded as the type the server inferred.
#[derive(Debug, Clone)]
pub(crate) struct InferredParam {
    value: InferredValue,
    type_info: PgTypeInfo,
}

impl InferredParam {
    fn null(type_info: PgTypeInfo) -> Self {
        Self {
            value: InferredValue::Null,
            type_info,
        }
    }

    /// Convert a string to the placeholder's inferred type.
    ///
    /// Types whose binary form is their text (text, varchar, name, citext,
    /// enums) are sent as-is. Other types without a conversion here (NUMERIC,
    /// BYTEA, arrays, INTERVAL, INET, ...) are rejected with a cast hint.
    fn from_text(s: &str, type_info: &PgTypeInfo, position: usize) -> DbResult<Self> {
        let name = type_info.name();
        let mismatch = || {
            DbError::invalid_input(format!(
                "Parameter ${} has type {} and cannot be parsed from '{}'",
                position, name, s
            ))
        };

        let value = match categorize_type(name, DatabaseType::PostgreSQL) {
            TypeCategory::Integer => {
                let v: i64 = s.trim().parse().map_err(|_| mismatch())?;
                match name {
                    "INT2" => InferredValue::Int2(i16::try_from(v).map_err(|_| mismatch())?),
                    "INT4" => InferredValue::Int4(i32::try_from(v).map_err(|_| mismatch())?),
                    _ => InferredValue::Int8(v),
                }
            }
            TypeCategory::Float => {
                let v: f64 = s.trim().parse().map_err(|_| mismatch())?;
                if name == "FLOAT4" {
                    InferredValue::Float4(v as f32)
                } else {
                    InferredValue::Float8(v)
                }
            }
            TypeCategory::Boolean => InferredValue::Bool(parse_bool(s).ok_or_else(mismatch)?),
            TypeCategory::Json => {
                // Strings that are not JSON documents are stored as JSON strings
                let doc = match serde_json::from_str::<JsonValue>(s) {
                    Ok(_) => s.to_string(),
                    Err(_) => JsonValue::String(s.to_string()).to_string(),
                };
                InferredValue::Json(doc, name == "JSONB")
            }
            TypeCategory::Uuid => {
                InferredValue::Uuid(uuid::Uuid::parse_str(s.trim()).map_err(|_| mismatch())?)
            }
            TypeCategory::Date => InferredValue::Date(
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| mismatch())?,
            ),
            TypeCategory::Time => InferredValue::Time(
                NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                    .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M"))
                    .map_err(|_| mismatch())?,
            ),
            TypeCategory::Timestamp => {
                InferredValue::Timestamp(parse_timestamp(s.trim()).ok_or_else(mismatch)?)
            }
            TypeCategory::TimestampTz => {
                InferredValue::TimestampTz(parse_timestamptz(s.trim()).ok_or_else(mismatch)?)
            }
            TypeCategory::Text => InferredValue::Text(s.to_string()),
            TypeCategory::Unknown if is_text_like(type_info) => InferredValue::Text(s.to_string()),
            _ => {
                return Err(DbError::invalid_input(format!(
                    "Parameter ${} has type {}, which strings are not converted to; cast the placeholder, e.g. ${}::text::{}",
                    position,
                    name,
                    position,
                    name.to_lowercase()
                )));
            }
        };

        Ok(Self {
            value,
            type_info: type_info.clone(),
        })
    }
}

/// Only called with types resolved by the server, so `kind()` is known.
fn is_text_like(type_info: &PgTypeInfo) -> bool {
    let name = type_info.name();
    ["NAME", "CITEXT", "UNKNOWN"]
        .iter()
        .any(|t| name.eq_ignore_ascii_case(t))
        || matches!(type_info.kind(), PgTypeKind::Enum(_))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_timestamptz(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(v) = DateTime::parse_from_rfc3339(s) {
        return Some(v.with_timezone(&Utc));
    }
    if let Ok(v) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(v.with_timezone(&Utc));
    }
    // No offset: read as UTC
    parse_timestamp(s).map(|v| v.and_utc())
}

impl Type<Postgres> for InferredParam {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl<'q> Encode<'q, Postgres> for InferredParam {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        match &self.value {
            InferredValue::Null => Ok(IsNull::Yes),
            InferredValue::Text(v) => <&str as Encode<Postgres>>::encode_by_ref(&v.as_str(), buf),
            InferredValue::Json(doc, jsonb) => {
                if *jsonb {
                    // JSONB binary format version
                    buf.push(1);
                }
                buf.extend_from_slice(doc.as_bytes());
                Ok(IsNull::No)
            }
            InferredValue::Int2(v) => <i16 as Encode<Postgres>>::encode_by_ref(v, buf),
            InferredValue::Int4(v) => <i32 as Encode<Postgres>>::encode_by_ref(v, buf),
            InferredValue::Int8(v) => <i64 as Encode<Postgres>>::encode_by_ref(v, buf),
            InferredValue::Float4(v) => <f32 as Encode<Postgres>>::encode_by_ref(v, buf),
            InferredValue::Float8(v) => <f64 as Encode<Postgres>>::encode_by_ref(v, buf),
            InferredValue::Bool(v) => <bool as Encode<Postgres>>::encode_by_ref(v, buf),
            InferredValue::Uuid(v) => <uuid::Uuid as Encode<Postgres>>::encode_by_ref(v, buf),
            InferredValue::Date(v) => <NaiveDate as Encode<Postgres>>::encode_by_ref(v, buf),
            InferredValue::Time(v) => <NaiveTime as Encode<Postgres>>::encode_by_ref(v, buf),
            InferredValue::Timestamp(v) => {
                <NaiveDateTime as Encode<Postgres>>::encode_by_ref(v, buf)
            }
            InferredValue::TimestampTz(v) => {
                <DateTime<Utc> as Encode<Postgres>>::encode_by_ref(v, buf)
            }
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.type_info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg_type<T: Type<Postgres>>() -> PgTypeInfo {
        T::type_info()
    }

    struct RawNumeric;

    impl Type<Postgres> for RawNumeric {
        fn type_info() -> PgTypeInfo {
            PgTypeInfo::with_name("NUMERIC")
        }
    }

    #[test]
    fn test_null_and_strings_are_declared_untyped() {
        assert_eq!(
            declared_postgres_type(&QueryParam::Null),
            PgTypeInfo::with_oid(Oid(0))
        );
        assert_eq!(
            declared_postgres_type(&QueryParam::String("x".into())),
            PgTypeInfo::with_oid(Oid(0))
        );
        assert_eq!(declared_postgres_type(&QueryParam::Int(1)), pg_type::<i64>());
        assert!(is_untyped(&QueryParam::Null));
        assert!(!is_untyped(&QueryParam::Bool(true)));
    }

    #[test]
    fn test_string_converted_to_inferred_type() {
        let date = InferredParam::from_text("2001-02-03", &pg_type::<NaiveDate>(), 1).unwrap();
        assert_eq!(
            date.value,
            InferredValue::Date(NaiveDate::from_ymd_opt(2001, 2, 3).unwrap())
        );
        assert_eq!(date.produces(), Some(pg_type::<NaiveDate>()));

        let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let uuid = InferredParam::from_text(id, &pg_type::<uuid::Uuid>(), 1).unwrap();
        assert_eq!(
            uuid.value,
            InferredValue::Uuid(uuid::Uuid::parse_str(id).unwrap())
        );

        let int = InferredParam::from_text("42", &pg_type::<i32>(), 1).unwrap();
        assert_eq!(int.value, InferredValue::Int4(42));

        let text = InferredParam::from_text("hello", &pg_type::<String>(), 1).unwrap();
        assert_eq!(text.value, InferredValue::Text("hello".into()));
    }

    #[test]
    fn test_timestamps_accept_common_forms() {
        assert!(parse_timestamp("2024-01-02T03:04:05").is_some());
        assert!(parse_timestamp("2024-01-02 03:04:05.123").is_some());
        assert!(parse_timestamp("2024-01-02").is_some());
        let tz = parse_timestamptz("2024-01-02T03:04:05+02:00").unwrap();
        assert_eq!(tz.to_rfc3339(), "2024-01-02T01:04:05+00:00");
    }

    #[test]
    fn test_unparseable_string_names_placeholder() {
        let err = InferredParam::from_text("soon", &pg_type::<NaiveDate>(), 3).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(err.to_string().contains("$3"));
    }

    #[test]
    fn test_json_target_keeps_documents() {
        let doc = InferredParam::from_text(r#"{"a":1}"#, &pg_type::<JsonValue>(), 1).unwrap();
        assert_eq!(
            doc.value,
            InferredValue::Json(r#"{"a":1}"#.into(), true)
        );
        let plain = InferredParam::from_text("abc", &pg_type::<JsonValue>(), 1).unwrap();
        assert_eq!(plain.value, InferredValue::Json(r#""abc""#.into(), true));
    }

    #[test]
    fn test_types_without_string_conversion_suggest_cast() {
        let err = InferredParam::from_text("1.50", &pg_type::<RawNumeric>(), 2).unwrap_err();
        assert!(err.to_string().contains("$2::text::numeric"));

        let err = InferredParam::from_text("{a,b}", &pg_type::<Vec<String>>(), 1).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_bool_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
