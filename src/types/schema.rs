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

//! Column schema describing both the JSON fields read from each record and
//! the layout of the produced rows.

use crate::error::{Error, Result};
use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Primitive column types supported by the row converter.
///
/// Serialized as the snake_case variant name. Deserialization also accepts
/// SQL type names (see [`ColumnType::from_type_name`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Utf8,
    Int64,
    Float64,
    Boolean,
    /// Days since the Unix epoch.
    Date32,
    /// Milliseconds since the Unix epoch, UTC.
    TimestampMillis,
}

impl ColumnType {
    /// Map a SQL-style type name to a column type.
    ///
    /// Parameterized names such as `VARCHAR(255)` are matched on their base
    /// name. Unknown names fall back to `Utf8`.
    pub fn from_type_name(type_name: &str) -> Self {
        let type_upper = type_name.to_uppercase();
        let base_type = type_upper.split('(').next().unwrap_or(&type_upper).trim();

        match base_type {
            "BOOLEAN" | "BOOL" | "BIT" => ColumnType::Boolean,
            "TINYINT" | "SMALLINT" | "INT" | "INTEGER" | "BIGINT" | "LONG" => ColumnType::Int64,
            "FLOAT" | "REAL" | "DOUBLE" | "DECIMAL" | "NUMERIC" => ColumnType::Float64,
            "DATE" | "DATEDAY" => ColumnType::Date32,
            "TIMESTAMP" | "DATEMILLI" => ColumnType::TimestampMillis,
            "STRING" | "VARCHAR" | "CHAR" | "TEXT" => ColumnType::Utf8,
            _ => {
                tracing::debug!("Unknown type name '{}', mapping to Utf8", type_name);
                ColumnType::Utf8
            }
        }
    }

    fn from_variant_name(name: &str) -> Option<Self> {
        match name {
            "utf8" => Some(ColumnType::Utf8),
            "int64" => Some(ColumnType::Int64),
            "float64" => Some(ColumnType::Float64),
            "boolean" => Some(ColumnType::Boolean),
            "date32" => Some(ColumnType::Date32),
            "timestamp_millis" => Some(ColumnType::TimestampMillis),
            _ => None,
        }
    }

    /// Map an Arrow data type to a column type, if it is supported.
    pub fn from_arrow(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Utf8 | DataType::LargeUtf8 => Some(ColumnType::Utf8),
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32 => Some(ColumnType::Int64),
            DataType::Float32 | DataType::Float64 => Some(ColumnType::Float64),
            DataType::Boolean => Some(ColumnType::Boolean),
            DataType::Date32 | DataType::Date64 => Some(ColumnType::Date32),
            DataType::Timestamp(_, _) => Some(ColumnType::TimestampMillis),
            _ => None,
        }
    }

    /// Arrow data type used for this column in produced blocks.
    pub fn arrow_type(&self) -> DataType {
        match self {
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Date32 => DataType::Date32,
            ColumnType::TimestampMillis => {
                DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()))
            }
        }
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_variant_name(&name).unwrap_or_else(|| Self::from_type_name(&name)))
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered, validated list of columns.
///
/// Column names are non-empty and unique, and there is at least one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    columns: Vec<Column>,
}

impl ColumnSchema {
    pub fn try_new(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::validation("column schema has no columns"));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.name.is_empty() {
                return Err(Error::validation("column schema has a column with an empty name"));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(Error::validation(format!(
                    "column '{}' appears more than once in the schema",
                    column.name
                )));
            }
        }

        Ok(Self { columns })
    }

    /// Parse a schema from a JSON array of `{"name": ..., "type": ...}` objects,
    /// as declared through the `slack.schema.<table>` option.
    pub fn from_json(json: &str) -> Result<Self> {
        let columns: Vec<Column> = serde_json::from_str(json)
            .map_err(|e| Error::validation(format!("Failed to parse column schema: {}", e)))?;
        Self::try_new(columns)
    }

    /// Build a schema from an Arrow schema, as handed over by a query engine.
    pub fn from_arrow(schema: &Schema) -> Result<Self> {
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                ColumnType::from_arrow(field.data_type())
                    .map(|column_type| Column::new(field.name(), column_type))
                    .ok_or_else(|| {
                        Error::validation(format!(
                            "column '{}' has unsupported type {}",
                            field.name(),
                            field.data_type()
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::try_new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Arrow schema of the blocks produced for this column schema.
    ///
    /// Every field is nullable since source records may omit any field.
    pub fn to_arrow(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(&c.name, c.column_type.arrow_type(), true))
            .collect();
        Arc::new(Schema::new(fields))
    }
}

/// Schema of the `member` table: one row per member per day, as returned by
/// the Slack analytics endpoint with `type=member`.
pub fn member_analytics() -> ColumnSchema {
    use ColumnType::*;

    let columns = [
        ("date", Date32),
        ("enterprise_id", Utf8),
        ("team_id", Utf8),
        ("user_id", Utf8),
        ("email_address", Utf8),
        ("enterprise_employee_number", Utf8),
        ("is_guest", Boolean),
        ("is_billable_seat", Boolean),
        ("is_active", Boolean),
        ("is_active_ios", Boolean),
        ("is_active_android", Boolean),
        ("is_active_desktop", Boolean),
        ("is_active_apps", Boolean),
        ("is_active_workflows", Boolean),
        ("is_active_slack_connect", Boolean),
        ("reactions_added_count", Int64),
        ("messages_posted_count", Int64),
        ("channel_messages_posted_count", Int64),
        ("files_added_count", Int64),
        ("total_calls_count", Int64),
        ("slack_calls_count", Int64),
        ("slack_huddles_count", Int64),
        ("search_count", Int64),
        ("date_claimed", TimestampMillis),
    ];

    ColumnSchema {
        columns: columns
            .into_iter()
            .map(|(name, column_type)| Column::new(name, column_type))
            .collect(),
    }
}
