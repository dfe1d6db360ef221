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

//! Converted rows handed to the output sink.

use crate::types::schema::ColumnType;

/// A single typed value in a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Utf8(String),
    Int64(i64),
    Float64(f64),
    Boolean(bool),
    Date32(i32),
    TimestampMillis(i64),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Whether this cell can be stored in a column of the given type.
    /// Nulls fit every column.
    pub fn fits(&self, column_type: ColumnType) -> bool {
        matches!(
            (self, column_type),
            (Cell::Null, _)
                | (Cell::Utf8(_), ColumnType::Utf8)
                | (Cell::Int64(_), ColumnType::Int64)
                | (Cell::Float64(_), ColumnType::Float64)
                | (Cell::Boolean(_), ColumnType::Boolean)
                | (Cell::Date32(_), ColumnType::Date32)
                | (Cell::TimestampMillis(_), ColumnType::TimestampMillis)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Utf8(s) => Some(s),
            _ => None,
        }
    }
}

/// One converted record, with one cell per schema column in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_null()).count()
    }
}
