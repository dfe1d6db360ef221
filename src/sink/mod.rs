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

//! Output sinks receiving converted rows.
//!
//! The read loop only depends on [`RowSink`]. Buffering, block sizing and
//! offloading belong to the sink. [`BlockSpiller`] is an in-memory Arrow
//! implementation that seals rows into `RecordBatch` blocks.

pub mod block;

use crate::error::Result;
use crate::types::Row;
use async_trait::async_trait;

pub use block::{BlockSpiller, DEFAULT_MAX_ROWS_PER_BLOCK};

/// Receives rows from the read loop in small batches.
#[async_trait]
pub trait RowSink: Send {
    /// Take ownership of a batch of rows, in order, and return how many of
    /// them were written. Rows not counted are considered rejected by the
    /// sink; the count never exceeds `rows.len()`.
    async fn write_rows(&mut self, rows: Vec<Row>) -> Result<usize>;
}
