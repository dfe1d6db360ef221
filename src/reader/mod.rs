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

//! The fetch-parse-emit loop.
//!
//! [`RecordReader::read`] drives one partition through these states:
//!
//! ```text
//!   Init -> Fetching -> Parsing <-> Emitting -> Drained | Cancelled | Failed
//! ```
//!
//! - `Init`: partition and schema are validated
//! - `Fetching`: a line stream is connected and opened
//! - `Parsing`: the query status is polled, then one line is pulled and
//!   decoded as JSON
//! - `Emitting`: the record is converted and the row handed to the sink in
//!   batches of at most `sink_batch_size` rows
//!
//! The result is all-or-nothing: either the stream was drained (or the
//! query was cancelled) and `Ok(ReadOutcome)` is returned, or a single
//! error wrapped with the failing stage is returned. The connection is
//! released exactly once whichever way the loop ends.

pub mod converter;
pub mod status;

use crate::client::{FetchRequest, LineSource, LineStream};
use crate::error::{Error, Result};
use crate::sink::RowSink;
use crate::types::{ColumnSchema, PartitionDescriptor, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

pub use converter::{CoercionPolicy, Conversion, RowConverter, SkipReason};
pub use status::QueryStatusChecker;

/// Upper bound on rows handed to the sink in a single call. Larger batches
/// take block sizing out of the sink's hands.
pub const MAX_SINK_BATCH_SIZE: usize = 10;

/// States of the read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadState {
    Init,
    Fetching,
    Parsing,
    Emitting,
    Drained,
    Cancelled,
    Failed,
}

impl std::fmt::Display for ReadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReadState::Init => "validating",
            ReadState::Fetching => "fetching",
            ReadState::Parsing => "parsing",
            ReadState::Emitting => "emitting",
            ReadState::Drained => "drained",
            ReadState::Cancelled => "cancelled",
            ReadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What to do with a line that holds no record: a blank line, or valid
/// JSON that is not an object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinePolicy {
    /// Fail the read with a decode error naming the line.
    #[default]
    Fail,
    /// Count the line and move on to the next one.
    Skip,
}

impl LinePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinePolicy::Fail => "fail",
            LinePolicy::Skip => "skip",
        }
    }
}

impl std::str::FromStr for LinePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            other => Err(Error::validation(format!(
                "unknown line policy '{}', expected 'fail' or 'skip'",
                other
            ))),
        }
    }
}

/// Tunables of the read loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// Rows per sink call, `1..=MAX_SINK_BATCH_SIZE`.
    pub sink_batch_size: usize,
    /// Empty or whitespace-only lines.
    pub blank_lines: LinePolicy,
    /// Lines holding JSON that is not an object.
    pub non_object_lines: LinePolicy,
    pub coercion: CoercionPolicy,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            sink_batch_size: 1,
            blank_lines: LinePolicy::default(),
            non_object_lines: LinePolicy::default(),
            coercion: CoercionPolicy::default(),
        }
    }
}

impl ReaderOptions {
    pub fn validate(&self) -> Result<()> {
        if self.sink_batch_size == 0 || self.sink_batch_size > MAX_SINK_BATCH_SIZE {
            return Err(Error::validation(format!(
                "sink_batch_size must be between 1 and {}, got {}",
                MAX_SINK_BATCH_SIZE, self.sink_batch_size
            )));
        }
        Ok(())
    }
}

/// Summary of a read that ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// `Drained` or `Cancelled`.
    pub state: ReadState,
    /// Lines pulled from the stream, including blank ones.
    pub lines_read: u64,
    /// Rows the sink reported as written.
    pub rows_written: u64,
    /// Rows handed to the sink but not counted as written.
    pub rows_rejected: u64,
    /// Non-object lines skipped under `LinePolicy::Skip`.
    pub rows_skipped: u64,
    /// Blank lines skipped under `LinePolicy::Skip`.
    pub blank_lines: u64,
}

impl ReadOutcome {
    fn new() -> Self {
        Self {
            state: ReadState::Init,
            lines_read: 0,
            rows_written: 0,
            rows_rejected: 0,
            rows_skipped: 0,
            blank_lines: 0,
        }
    }

    /// Rows handed to the sink, written or not.
    pub fn rows_emitted(&self) -> u64 {
        self.rows_written + self.rows_rejected
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == ReadState::Cancelled
    }
}

/// Owns a line stream for the duration of one read and disconnects it
/// exactly once, on `release` or on drop.
struct ConnectionGuard {
    stream: Box<dyn LineStream>,
    released: bool,
}

impl ConnectionGuard {
    fn new(stream: Box<dyn LineStream>) -> Self {
        Self {
            stream,
            released: false,
        }
    }

    fn stream(&mut self) -> &mut dyn LineStream {
        self.stream.as_mut()
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.stream.disconnect();
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Reads partitions from a [`LineSource`] into a [`RowSink`].
///
/// The reader holds no per-read state, so one instance can serve many
/// partitions concurrently.
#[derive(Debug, Clone)]
pub struct RecordReader {
    source: Arc<dyn LineSource>,
    options: ReaderOptions,
    converter: RowConverter,
}

impl RecordReader {
    pub fn new(source: Arc<dyn LineSource>, options: ReaderOptions) -> Result<Self> {
        options.validate()?;
        let converter = RowConverter::new(options.coercion);
        Ok(Self {
            source,
            options,
            converter,
        })
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Read one partition to completion or cancellation.
    pub async fn read(
        &self,
        partition: &PartitionDescriptor,
        schema: &ColumnSchema,
        sink: &mut dyn RowSink,
        status: &dyn QueryStatusChecker,
    ) -> Result<ReadOutcome> {
        partition
            .validate()
            .map_err(|e| e.in_stage(ReadState::Init))?;
        if schema.is_empty() {
            return Err(Error::validation("column schema has no columns").in_stage(ReadState::Init));
        }

        info!(
            "Reading partition date={} ({} columns, sink_batch_size={})",
            partition.date(),
            schema.len(),
            self.options.sink_batch_size
        );

        let mut outcome = ReadOutcome::new();
        let mut guard = ConnectionGuard::new(self.source.connect());
        let result = self
            .run(&mut guard, partition, schema, sink, status, &mut outcome)
            .await;
        guard.release();

        match result {
            Ok(state) => {
                outcome.state = state;
                info!(
                    "Partition date={} {}: {} lines, {} rows written, {} rejected, {} skipped",
                    partition.date(),
                    state,
                    outcome.lines_read,
                    outcome.rows_written,
                    outcome.rows_rejected,
                    outcome.rows_skipped
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    "Partition date={} failed after {} lines: {}",
                    partition.date(),
                    outcome.lines_read,
                    e
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        guard: &mut ConnectionGuard,
        partition: &PartitionDescriptor,
        schema: &ColumnSchema,
        sink: &mut dyn RowSink,
        status: &dyn QueryStatusChecker,
        outcome: &mut ReadOutcome,
    ) -> Result<ReadState> {
        if !status.is_query_running() {
            warn!("Query no longer running, not fetching date={}", partition.date());
            return Ok(ReadState::Cancelled);
        }

        let request = FetchRequest::for_partition(partition);
        guard
            .stream()
            .open(&request)
            .await
            .map_err(|e| e.in_stage(ReadState::Fetching))?;

        let mut pending: Vec<Row> = Vec::with_capacity(self.options.sink_batch_size);

        loop {
            if !status.is_query_running() {
                warn!(
                    "Query no longer running, stopping date={} after {} lines",
                    partition.date(),
                    outcome.lines_read
                );
                self.flush(&mut pending, sink, outcome).await?;
                return Ok(ReadState::Cancelled);
            }

            let line = guard
                .stream()
                .next_line()
                .await
                .map_err(|e| e.in_stage(ReadState::Parsing))?;
            let Some(line) = line else {
                self.flush(&mut pending, sink, outcome).await?;
                return Ok(ReadState::Drained);
            };

            outcome.lines_read += 1;
            let line_number = outcome.lines_read;
            trace!("Line {}: {}", line_number, line);

            if line.trim().is_empty() {
                match self.options.blank_lines {
                    LinePolicy::Skip => {
                        debug!("Skipping blank line {}", line_number);
                        outcome.blank_lines += 1;
                        continue;
                    }
                    LinePolicy::Fail => {
                        return Err(
                            Error::decode(line_number, "line is empty").in_stage(ReadState::Parsing)
                        );
                    }
                }
            }

            let record: serde_json::Value = serde_json::from_str(&line).map_err(|e| {
                Error::decode(line_number, e.to_string()).in_stage(ReadState::Parsing)
            })?;

            match self
                .converter
                .convert(&record, schema)
                .map_err(|e| e.in_stage(ReadState::Emitting))?
            {
                Conversion::Row(row) => {
                    pending.push(row);
                    if pending.len() >= self.options.sink_batch_size {
                        self.flush(&mut pending, sink, outcome).await?;
                    }
                }
                Conversion::Skipped(SkipReason::NotAnObject) => {
                    if self.options.non_object_lines == LinePolicy::Fail {
                        return Err(Error::decode(line_number, "line is not a JSON object")
                            .in_stage(ReadState::Parsing));
                    }
                    debug!("Skipping line {}: not a JSON object", line_number);
                    outcome.rows_skipped += 1;
                }
            }
        }
    }

    /// Hand the pending rows to the sink and account for what it accepted.
    async fn flush(
        &self,
        pending: &mut Vec<Row>,
        sink: &mut dyn RowSink,
        outcome: &mut ReadOutcome,
    ) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }

        let submitted = pending.len();
        let rows = std::mem::replace(pending, Vec::with_capacity(self.options.sink_batch_size));
        let accepted = sink
            .write_rows(rows)
            .await
            .map_err(|e| e.in_stage(ReadState::Emitting))?;

        if accepted > submitted {
            return Err(Error::sink(format!(
                "sink reported {} rows written out of {} submitted",
                accepted, submitted
            ))
            .in_stage(ReadState::Emitting));
        }
        if accepted < submitted {
            warn!("Sink accepted {} of {} rows", accepted, submitted);
        }

        outcome.rows_written += accepted as u64;
        outcome.rows_rejected += (submitted - accepted) as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_options_default() {
        let options = ReaderOptions::default();
        assert_eq!(options.sink_batch_size, 1);
        assert_eq!(options.blank_lines, LinePolicy::Fail);
        assert_eq!(options.non_object_lines, LinePolicy::Fail);
        assert_eq!(options.coercion, CoercionPolicy::Lenient);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_reader_options_batch_bounds() {
        let mut options = ReaderOptions::default();
        options.sink_batch_size = 0;
        assert!(options.validate().is_err());
        options.sink_batch_size = MAX_SINK_BATCH_SIZE;
        assert!(options.validate().is_ok());
        options.sink_batch_size = MAX_SINK_BATCH_SIZE + 1;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_line_policy_from_str() {
        assert_eq!("Skip".parse::<LinePolicy>().unwrap(), LinePolicy::Skip);
        assert_eq!(LinePolicy::Skip.as_str(), "skip");
        assert!("ignore".parse::<LinePolicy>().is_err());
    }

    #[test]
    fn test_read_state_display() {
        assert_eq!(ReadState::Fetching.to_string(), "fetching");
        assert_eq!(ReadState::Init.to_string(), "validating");
    }

    #[test]
    fn test_outcome_rows_emitted() {
        let mut outcome = ReadOutcome::new();
        outcome.rows_written = 3;
        outcome.rows_rejected = 2;
        assert_eq!(outcome.rows_emitted(), 5);
        assert!(!outcome.is_cancelled());
    }
}
