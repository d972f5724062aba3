//! Row decoding: `tokio_postgres::Row` → [`Record`].

use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value};
use std::error::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Kind, Type};

/// One decoded row, keyed by column name.
pub type Record = Map<String, Value>;

/// Timestamps are rendered the way the application layer expects them.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Decode every column of `row` into a JSON object.
pub fn to_record(row: &Row) -> OrmResult<Record> {
    let mut record = Map::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = extract_value(row, idx, column.type_())
            .map_err(|e| OrmError::decode(column.name(), e.to_string()))?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

/// Decode a batch of rows.
pub fn to_records(rows: &[Row]) -> OrmResult<Vec<Record>> {
    rows.iter().map(to_record).collect()
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>, tokio_postgres::Error> {
    row.try_get::<_, Option<T>>(idx)
}

fn json_or_null<T>(value: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
    value.map_or(Value::Null, f)
}

fn extract_value(row: &Row, idx: usize, ty: &Type) -> Result<Value, tokio_postgres::Error> {
    let value = match *ty {
        Type::BOOL => json_or_null(get::<bool>(row, idx)?, Value::Bool),
        Type::INT2 => json_or_null(get::<i16>(row, idx)?, Value::from),
        Type::INT4 => json_or_null(get::<i32>(row, idx)?, Value::from),
        Type::INT8 => json_or_null(get::<i64>(row, idx)?, Value::from),
        Type::OID => json_or_null(get::<u32>(row, idx)?, Value::from),
        Type::FLOAT4 => json_or_null(get::<f32>(row, idx)?, |v| Value::from(f64::from(v))),
        Type::FLOAT8 => json_or_null(get::<f64>(row, idx)?, Value::from),
        Type::NUMERIC => json_or_null(get::<NumericText>(row, idx)?, |v| Value::String(v.0)),
        Type::JSON | Type::JSONB => get::<Value>(row, idx)?.unwrap_or(Value::Null),
        Type::TIMESTAMP => json_or_null(get::<NaiveDateTime>(row, idx)?, |v| {
            Value::String(v.format(DATETIME_FORMAT).to_string())
        }),
        Type::TIMESTAMPTZ => json_or_null(get::<DateTime<Utc>>(row, idx)?, |v| {
            Value::String(v.format(DATETIME_FORMAT).to_string())
        }),
        Type::DATE => json_or_null(get::<NaiveDate>(row, idx)?, |v| {
            Value::String(v.format(DATE_FORMAT).to_string())
        }),
        Type::TIME => json_or_null(get::<NaiveTime>(row, idx)?, |v| Value::String(v.to_string())),
        Type::UUID => json_or_null(get::<uuid::Uuid>(row, idx)?, |v| Value::String(v.to_string())),
        Type::BYTEA => json_or_null(get::<Vec<u8>>(row, idx)?, Value::from),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
            json_or_null(get::<Vec<Option<String>>>(row, idx)?, Value::from)
        }
        Type::INT4_ARRAY => json_or_null(get::<Vec<Option<i32>>>(row, idx)?, Value::from),
        Type::INT8_ARRAY => json_or_null(get::<Vec<Option<i64>>>(row, idx)?, Value::from),
        Type::BOOL_ARRAY => json_or_null(get::<Vec<Option<bool>>>(row, idx)?, Value::from),
        // text, varchar, bpchar, name, citext, enums
        _ => json_or_null(get::<RawText>(row, idx)?, |v| Value::String(v.0)),
    };
    Ok(value)
}

type BoxError = Box<dyn Error + Sync + Send>;

/// `numeric` rendered as its exact decimal text.
///
/// Binary layout: `ndigits`, `weight`, `sign`, `dscale` (all 16 bit), then
/// `ndigits` base-10000 digits. The first digit is scaled by `10000^weight`.
struct NumericText(String);

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

fn read_u16(raw: &[u8], at: usize) -> Result<u16, BoxError> {
    raw.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "numeric value is truncated".into())
}

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let ndigits = usize::from(read_u16(raw, 0)?);
        let weight = i64::from(read_u16(raw, 2)? as i16);
        let sign = read_u16(raw, 4)?;
        let dscale = usize::from(read_u16(raw, 6)?);
        let digits = (0..ndigits)
            .map(|n| read_u16(raw, 8 + 2 * n))
            .collect::<Result<Vec<_>, _>>()?;

        match sign {
            NUMERIC_NAN => return Ok(Self("NaN".into())),
            NUMERIC_PINF => return Ok(Self("Infinity".into())),
            NUMERIC_NINF => return Ok(Self("-Infinity".into())),
            _ => {}
        }
        let digit = |k: i64| -> u16 {
            usize::try_from(k)
                .ok()
                .and_then(|k| digits.get(k).copied())
                .unwrap_or(0)
        };

        let mut text = String::new();
        if sign == NUMERIC_NEG {
            text.push('-');
        }
        if weight < 0 {
            text.push('0');
        } else {
            text.push_str(&digit(0).to_string());
            for k in 1..=weight {
                text.push_str(&format!("{:04}", digit(k)));
            }
        }
        if dscale > 0 {
            let mut fraction = String::with_capacity(dscale + 4);
            let mut k = weight + 1;
            while fraction.len() < dscale {
                fraction.push_str(&format!("{:04}", digit(k)));
                k += 1;
            }
            fraction.truncate(dscale);
            text.push('.');
            text.push_str(&fraction);
        }
        Ok(Self(text))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Any textual column, including enum labels whose binary form is the label.
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        <String as FromSql>::accepts(ty) || matches!(ty.kind(), Kind::Enum(_))
    }
}
