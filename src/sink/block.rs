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

//! Arrow-backed sink that accumulates rows into fixed-size blocks.

use crate::error::{Error, Result};
use crate::sink::RowSink;
use crate::types::{Cell, ColumnSchema, ColumnType, Row};
use arrow_array::builder::{
    BooleanBuilder, Date32Builder, Float64Builder, Int64Builder, StringBuilder,
    TimestampMillisecondBuilder,
};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::SchemaRef;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Rows per sealed block unless configured otherwise.
pub const DEFAULT_MAX_ROWS_PER_BLOCK: usize = 10_000;

enum ColumnBuilder {
    Utf8(StringBuilder),
    Int64(Int64Builder),
    Float64(Float64Builder),
    Boolean(BooleanBuilder),
    Date32(Date32Builder),
    TimestampMillis(TimestampMillisecondBuilder),
}

impl ColumnBuilder {
    fn new(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Utf8 => Self::Utf8(StringBuilder::new()),
            ColumnType::Int64 => Self::Int64(Int64Builder::new()),
            ColumnType::Float64 => Self::Float64(Float64Builder::new()),
            ColumnType::Boolean => Self::Boolean(BooleanBuilder::new()),
            ColumnType::Date32 => Self::Date32(Date32Builder::new()),
            ColumnType::TimestampMillis => {
                Self::TimestampMillis(TimestampMillisecondBuilder::new().with_timezone("UTC"))
            }
        }
    }

    /// Append a cell. The caller has already checked that it fits.
    fn append(&mut self, cell: Cell) {
        match (self, cell) {
            (Self::Utf8(b), Cell::Utf8(v)) => b.append_value(v),
            (Self::Int64(b), Cell::Int64(v)) => b.append_value(v),
            (Self::Float64(b), Cell::Float64(v)) => b.append_value(v),
            (Self::Boolean(b), Cell::Boolean(v)) => b.append_value(v),
            (Self::Date32(b), Cell::Date32(v)) => b.append_value(v),
            (Self::TimestampMillis(b), Cell::TimestampMillis(v)) => b.append_value(v),
            (builder, _) => builder.append_null(),
        }
    }

    fn append_null(&mut self) {
        match self {
            Self::Utf8(b) => b.append_null(),
            Self::Int64(b) => b.append_null(),
            Self::Float64(b) => b.append_null(),
            Self::Boolean(b) => b.append_null(),
            Self::Date32(b) => b.append_null(),
            Self::TimestampMillis(b) => b.append_null(),
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            Self::Utf8(b) => Arc::new(b.finish()),
            Self::Int64(b) => Arc::new(b.finish()),
            Self::Float64(b) => Arc::new(b.finish()),
            Self::Boolean(b) => Arc::new(b.finish()),
            Self::Date32(b) => Arc::new(b.finish()),
            Self::TimestampMillis(b) => Arc::new(b.finish()),
        }
    }
}

/// Accumulates rows into Arrow `RecordBatch` blocks of at most
/// `max_rows_per_block` rows.
///
/// Sealed blocks are kept until drained with [`BlockSpiller::take_blocks`]
/// or returned by [`BlockSpiller::finish`].
pub struct BlockSpiller {
    schema: ColumnSchema,
    arrow_schema: SchemaRef,
    builders: Vec<ColumnBuilder>,
    rows_in_block: usize,
    max_rows_per_block: usize,
    blocks: Vec<RecordBatch>,
    total_rows: usize,
}

impl std::fmt::Debug for BlockSpiller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockSpiller")
            .field("columns", &self.schema.len())
            .field("rows_in_block", &self.rows_in_block)
            .field("max_rows_per_block", &self.max_rows_per_block)
            .field("sealed_blocks", &self.blocks.len())
            .field("total_rows", &self.total_rows)
            .finish()
    }
}

impl BlockSpiller {
    pub fn new(schema: ColumnSchema, max_rows_per_block: usize) -> Result<Self> {
        if max_rows_per_block == 0 {
            return Err(Error::validation("max_rows_per_block must be greater than 0"));
        }
        let arrow_schema = schema.to_arrow();
        let builders = Self::new_builders(&schema);
        Ok(Self {
            schema,
            arrow_schema,
            builders,
            rows_in_block: 0,
            max_rows_per_block,
            blocks: Vec::new(),
            total_rows: 0,
        })
    }

    fn new_builders(schema: &ColumnSchema) -> Vec<ColumnBuilder> {
        schema
            .columns()
            .iter()
            .map(|c| ColumnBuilder::new(c.column_type))
            .collect()
    }

    /// Arrow schema of the produced blocks.
    pub fn schema(&self) -> SchemaRef {
        self.arrow_schema.clone()
    }

    /// Rows written so far, sealed or not.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Sealed blocks not yet drained.
    pub fn blocks(&self) -> &[RecordBatch] {
        &self.blocks
    }

    /// Drain the sealed blocks, leaving the open block in place.
    pub fn take_blocks(&mut self) -> Vec<RecordBatch> {
        std::mem::take(&mut self.blocks)
    }

    /// Seal the open block, if it has rows, and return every undrained block.
    pub fn finish(mut self) -> Result<Vec<RecordBatch>> {
        self.seal_block()?;
        Ok(self.blocks)
    }

    fn check_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.schema.len() {
            return Err(Error::sink(format!(
                "row has {} cells but the schema has {} columns",
                row.len(),
                self.schema.len()
            )));
        }
        for (cell, column) in row.cells().iter().zip(self.schema.columns()) {
            if !cell.fits(column.column_type) {
                return Err(Error::sink(format!(
                    "cell {:?} does not fit column '{}' of type {:?}",
                    cell, column.name, column.column_type
                )));
            }
        }
        Ok(())
    }

    fn append_row(&mut self, row: Row) -> Result<()> {
        self.check_row(&row)?;
        for (builder, cell) in self.builders.iter_mut().zip(row.into_cells()) {
            builder.append(cell);
        }
        self.rows_in_block += 1;
        self.total_rows += 1;

        if self.rows_in_block >= self.max_rows_per_block {
            self.seal_block()?;
        }
        Ok(())
    }

    fn seal_block(&mut self) -> Result<()> {
        if self.rows_in_block == 0 {
            return Ok(());
        }

        let arrays: Vec<ArrayRef> = self.builders.iter_mut().map(|b| b.finish()).collect();
        let block = RecordBatch::try_new(self.arrow_schema.clone(), arrays)
            .map_err(|e| Error::sink(format!("Failed to seal block: {}", e)))?;

        debug!("Sealed block {}: {} rows", self.blocks.len(), block.num_rows());

        self.blocks.push(block);
        self.rows_in_block = 0;
        Ok(())
    }
}

#[async_trait]
impl RowSink for BlockSpiller {
    async fn write_rows(&mut self, rows: Vec<Row>) -> Result<usize> {
        let count = rows.len();
        for row in rows {
            self.append_row(row)?;
        }
        Ok(count)
    }
}
