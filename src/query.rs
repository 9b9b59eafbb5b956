//! The locked verification read.
//!
//! One row is produced per row matched by the locating condition, each with a
//! single boolean column telling whether the stored version is within the
//! tolerance window of the client-supplied one. Every matched row is locked
//! for update for the rest of the enclosing transaction.

use crate::catalog::{QualifiedName, quote_ident};
use crate::core::{DataType, DbError, Result, Value};
use crate::locate::RowCondition;
use std::fmt;
use std::time::Duration;

pub const VERSION_MATCHES_COLUMN: &str = "version_matches";

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationQuery {
    pub table: QualifiedName,
    pub version_column: String,
    pub version_type: DataType,
    pub expected_version: Value,
    pub tolerance: Duration,
    pub condition: RowCondition,
}

/// Parameterised SQL text with `$n` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub text: String,
    pub params: Vec<Value>,
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl VerificationQuery {
    /// PostgreSQL rendering of the locked read.
    pub fn to_sql(&self) -> SqlStatement {
        let version = quote_ident(&self.version_column);
        let (projection, mut params) = if self.version_type.is_temporal() {
            (
                format!(
                    "abs(extract(epoch from ({} - $1::{}))) < $2::double precision",
                    version,
                    self.version_type.sql_name()
                ),
                vec![
                    self.expected_version.clone(),
                    Value::Float(self.tolerance.as_secs_f64()),
                ],
            )
        } else {
            (
                format!("{} = $1::{}", version, self.version_type.sql_name()),
                vec![self.expected_version.clone()],
            )
        };

        let (predicate, condition_params) = self.condition.to_sql(params.len() + 1);
        params.extend(condition_params);

        SqlStatement {
            text: format!(
                "select {} as {} from {} where {} for update",
                projection,
                quote_ident(VERSION_MATCHES_COLUMN),
                self.table.to_sql(),
                predicate
            ),
            params,
        }
    }

    /// Evaluates the projection for one stored version value. Timestamps
    /// compare within the tolerance window, anything else by equality; a
    /// NULL stored version never matches.
    pub fn version_matches(&self, stored: &Value) -> Result<bool> {
        match (stored, &self.expected_version) {
            (Value::Null, _) | (_, Value::Null) => Ok(false),
            (Value::Timestamp(stored), Value::Timestamp(expected)) => {
                let Some(diff) = stored.signed_duration_since(*expected).num_nanoseconds() else {
                    return Ok(false);
                };
                Ok(u128::from(diff.unsigned_abs()) < self.tolerance.as_nanos())
            }
            (Value::Timestamp(_), other) | (other, Value::Timestamp(_)) => {
                Err(DbError::TypeMismatch(format!(
                    "cannot compare timestamp version with {}",
                    other.type_name()
                )))
            }
            (stored, expected) => Ok(stored == expected),
        }
    }
}
