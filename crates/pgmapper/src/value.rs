//! Bound parameter values.
//!
//! [`SqlValue`] is the single value type carried by query descriptors and
//! compiled statements. It implements [`ToSql`] by looking at the column type
//! Postgres inferred for each placeholder, so one `SqlValue::Int` can bind to an
//! `int2`, `int4`, `int8`, float or text column.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::error::Error;
use std::fmt;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// A value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Whether this value is SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Json(_) => "json",
            Self::Timestamp(_) => "timestamp",
            Self::TimestampTz(_) => "timestamptz",
            Self::Date(_) => "date",
            Self::Uuid(_) => "uuid",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::Json(v) => write!(f, "'{v}'"),
            Self::Timestamp(v) => write!(f, "'{v}'"),
            Self::TimestampTz(v) => write!(f, "'{v}'"),
            Self::Date(v) => write!(f, "'{v}'"),
            Self::Uuid(v) => write!(f, "'{v}'"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Text-like columns (`text`, `varchar`, `bpchar`, `name`, `unknown`, citext...).
fn is_text(ty: &Type) -> bool {
    <String as ToSql>::accepts(ty)
}

fn is_json(ty: &Type) -> bool {
    matches!(*ty, Type::JSON | Type::JSONB)
}

fn mismatch(value: &SqlValue, ty: &Type) -> BoxError {
    format!("cannot bind {} value to column of type {}", value.kind(), ty).into()
}

#[cfg(feature = "rust_decimal")]
fn decimal_to_sql(text: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    let decimal: rust_decimal::Decimal = text.parse()?;
    decimal.to_sql(ty, out)
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Bool(v) => match *ty {
                Type::BOOL => v.to_sql(ty, out),
                _ if is_json(ty) => serde_json::Value::Bool(*v).to_sql(ty, out),
                _ if is_text(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Self::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::INT8 => v.to_sql(ty, out),
                Type::OID => u32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                #[cfg(feature = "rust_decimal")]
                Type::NUMERIC => rust_decimal::Decimal::from(*v).to_sql(ty, out),
                _ if is_json(ty) => serde_json::Value::from(*v).to_sql(ty, out),
                _ if is_text(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Self::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => v.to_sql(ty, out),
                #[cfg(feature = "rust_decimal")]
                Type::NUMERIC => decimal_to_sql(&v.to_string(), ty, out),
                _ if is_json(ty) => serde_json::Value::from(*v).to_sql(ty, out),
                _ if is_text(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Self::Text(v) => match *ty {
                _ if is_text(ty) => v.to_sql(ty, out),
                Type::UUID => Uuid::parse_str(v)?.to_sql(ty, out),
                #[cfg(feature = "rust_decimal")]
                Type::NUMERIC => decimal_to_sql(v, ty, out),
                _ if is_json(ty) => serde_json::Value::String(v.clone()).to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Self::Json(v) => match *ty {
                _ if is_json(ty) => v.to_sql(ty, out),
                _ if is_text(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Self::Timestamp(v) => match *ty {
                Type::TIMESTAMP => v.to_sql(ty, out),
                Type::TIMESTAMPTZ => Utc.from_utc_datetime(v).to_sql(ty, out),
                Type::DATE => v.date().to_sql(ty, out),
                _ if is_text(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Self::TimestampTz(v) => match *ty {
                Type::TIMESTAMPTZ => v.to_sql(ty, out),
                Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
                _ if is_text(ty) => v.to_rfc3339().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Self::Date(v) => match *ty {
                Type::DATE => v.to_sql(ty, out),
                _ if is_text(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Self::Uuid(v) => match *ty {
                Type::UUID => v.to_sql(ty, out),
                _ if is_text(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Self::Bytes(v) => match *ty {
                Type::BYTEA => v.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
        }
    }

    // Compatibility is decided per value in `to_sql`.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(value: $ty) -> Self {
                    SqlValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    NaiveDate => Date,
    Uuid => Uuid,
    Vec<u8> => Bytes,
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SqlValue::Text(s),
            composite @ (Value::Array(_) | Value::Object(_)) => SqlValue::Json(composite),
        }
    }
}
