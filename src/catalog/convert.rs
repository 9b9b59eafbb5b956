use crate::core::{DataType, DbError, Result, Value};
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use uuid::Uuid;

/// Maps a client-facing field value onto a column's storage representation.
pub trait ValueConverter: Send + Sync {
    fn to_storage(
        &self,
        value: &serde_json::Value,
        data_type: &DataType,
        type_modifier: Option<i32>,
    ) -> Result<Value>;
}

/// Default conversion: JSON scalars to [`Value`], honouring `varchar(n)` and
/// timestamp precision modifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageConverter;

impl ValueConverter for StorageConverter {
    fn to_storage(
        &self,
        value: &serde_json::Value,
        data_type: &DataType,
        type_modifier: Option<i32>,
    ) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match data_type {
            DataType::Integer => match value {
                serde_json::Value::Number(n) => n.as_i64().map(Value::Integer).ok_or_else(|| {
                    mismatch(value, data_type)
                }),
                // BigInt-style identifiers travel as strings
                serde_json::Value::String(s) => s
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| mismatch(value, data_type)),
                _ => Err(mismatch(value, data_type)),
            },
            DataType::Float => value
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| mismatch(value, data_type)),
            DataType::Text => value
                .as_str()
                .map(Value::from)
                .ok_or_else(|| mismatch(value, data_type)),
            DataType::Varchar => {
                let text = value.as_str().ok_or_else(|| mismatch(value, data_type))?;
                if let Some(limit) = type_modifier {
                    if limit >= 0 && text.chars().count() > limit as usize {
                        return Err(DbError::TypeMismatch(format!(
                            "value too long for varchar({})",
                            limit
                        )));
                    }
                }
                Ok(Value::from(text))
            }
            DataType::Boolean => value
                .as_bool()
                .map(Value::Boolean)
                .ok_or_else(|| mismatch(value, data_type)),
            DataType::Timestamp => {
                let text = value.as_str().ok_or_else(|| mismatch(value, data_type))?;
                let ts = parse_timestamp(text)?;
                Ok(Value::Timestamp(apply_precision(ts, type_modifier)))
            }
            DataType::Uuid => {
                let text = value.as_str().ok_or_else(|| mismatch(value, data_type))?;
                Uuid::parse_str(text)
                    .map(Value::Uuid)
                    .map_err(|e| DbError::TypeMismatch(format!("invalid uuid '{}': {}", text, e)))
            }
        }
    }
}

fn mismatch(value: &serde_json::Value, data_type: &DataType) -> DbError {
    DbError::TypeMismatch(format!("cannot convert {} to {}", value, data_type))
}

/// Accepts RFC 3339 and, failing that, a zone-less ISO timestamp read as UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| DbError::ParseError(format!("invalid timestamp '{}': {}", text, e)))
}

fn apply_precision(ts: DateTime<Utc>, type_modifier: Option<i32>) -> DateTime<Utc> {
    match type_modifier {
        Some(digits) if (0..=6).contains(&digits) => ts.trunc_subsecs(digits as u16),
        // Storage keeps microseconds at most
        _ => ts.trunc_subsecs(6),
    }
}
