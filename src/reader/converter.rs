// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Conversion of decoded JSON records into schema-typed rows.
//!
//! Every schema column is looked up by name in the record. Missing fields
//! and JSON `null` become [`Cell::Null`]. Present fields are coerced to the
//! column type only where the conversion is lossless; what happens to a
//! field that cannot be coerced is decided by [`CoercionPolicy`].

use crate::error::{Error, Result};
use crate::types::{Cell, ColumnSchema, ColumnType, Row};
use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// What to do with a present field that cannot be coerced to its column type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionPolicy {
    /// Write null for the field and keep the rest of the row.
    #[default]
    Lenient,
    /// Fail the conversion with `Error::Conversion`.
    Strict,
}

impl std::str::FromStr for CoercionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(Error::validation(format!(
                "unknown coercion policy '{}', expected 'lenient' or 'strict'",
                other
            ))),
        }
    }
}

/// Why a record produced no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The line decoded to JSON that is not an object.
    NotAnObject,
}

/// Outcome of converting one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    Row(Row),
    Skipped(SkipReason),
}

/// Stateless record-to-row converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowConverter {
    policy: CoercionPolicy,
}

impl RowConverter {
    pub fn new(policy: CoercionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> CoercionPolicy {
        self.policy
    }

    /// Convert one decoded record into a row with one cell per schema column.
    pub fn convert(&self, record: &Value, schema: &ColumnSchema) -> Result<Conversion> {
        let Value::Object(fields) = record else {
            return Ok(Conversion::Skipped(SkipReason::NotAnObject));
        };

        let cells = schema
            .columns()
            .iter()
            .map(|column| self.convert_field(fields, &column.name, column.column_type))
            .collect::<Result<Vec<_>>>()?;

        Ok(Conversion::Row(Row::new(cells)))
    }

    fn convert_field(
        &self,
        fields: &Map<String, Value>,
        name: &str,
        column_type: ColumnType,
    ) -> Result<Cell> {
        let value = match fields.get(name) {
            None | Some(Value::Null) => return Ok(Cell::Null),
            Some(value) => value,
        };

        if let Some(cell) = coerce(value, column_type) {
            return Ok(cell);
        }

        match self.policy {
            CoercionPolicy::Lenient => {
                tracing::debug!(
                    "Field '{}' ({}) cannot be stored as {:?}, writing null",
                    name,
                    json_type_name(value),
                    column_type
                );
                Ok(Cell::Null)
            }
            CoercionPolicy::Strict => Err(Error::conversion(format!(
                "column '{}' expects {:?} but the field is {}",
                name,
                column_type,
                json_type_name(value)
            ))),
        }
    }
}

/// Coerce a non-null JSON value to the column type, or `None` if no lossless
/// conversion exists.
fn coerce(value: &Value, column_type: ColumnType) -> Option<Cell> {
    match column_type {
        ColumnType::Utf8 => Some(Cell::Utf8(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        ColumnType::Int64 => match value {
            Value::Number(n) => number_to_i64(n).map(Cell::Int64),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Cell::Int64),
            _ => None,
        },
        ColumnType::Float64 => match value {
            Value::Number(n) => n.as_f64().map(Cell::Float64),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Cell::Float64),
            _ => None,
        },
        ColumnType::Boolean => match value {
            Value::Bool(b) => Some(Cell::Boolean(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(Cell::Boolean(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(Cell::Boolean(false)),
            _ => None,
        },
        ColumnType::Date32 => match value {
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .ok()
                .map(|d| Cell::Date32(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)),
            _ => None,
        },
        ColumnType::TimestampMillis => match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|ts| Cell::TimestampMillis(ts.timestamp_millis())),
            // Integral numbers are epoch seconds.
            Value::Number(n) => n
                .as_i64()
                .and_then(|secs| secs.checked_mul(1000))
                .map(Cell::TimestampMillis),
            _ => None,
        },
    }
}

fn number_to_i64(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
