// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Read loop tests against an in-memory line source.

use async_trait::async_trait;
use slack_analytics_connector::client::FetchRequest;
use slack_analytics_connector::{
    Cell, CoercionPolicy, Column, ColumnSchema, ColumnType, Error, ErrorKind, LinePolicy,
    LineSource, LineStream, PartitionDescriptor, ReadState, ReaderOptions, RecordReader, Result,
    Row, RowSink,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    opens: AtomicUsize,
    pulls: AtomicUsize,
    disconnects: AtomicUsize,
    last_request: Mutex<Option<(String, String)>>,
}

impl Counters {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct MockSource {
    lines: Vec<String>,
    fail_open: bool,
    /// Fail the pull with this 1-based index.
    fail_pull: Option<usize>,
    counters: Arc<Counters>,
}

impl MockSource {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            fail_open: false,
            fail_pull: None,
            counters: Arc::new(Counters::default()),
        }
    }
}

impl LineSource for MockSource {
    fn connect(&self) -> Box<dyn LineStream> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        Box::new(MockStream {
            lines: self.lines.iter().cloned().collect(),
            fail_open: self.fail_open,
            fail_pull: self.fail_pull,
            counters: self.counters.clone(),
            open: false,
        })
    }
}

struct MockStream {
    lines: VecDeque<String>,
    fail_open: bool,
    fail_pull: Option<usize>,
    counters: Arc<Counters>,
    open: bool,
}

#[async_trait]
impl LineStream for MockStream {
    async fn open(&mut self, request: &FetchRequest) -> Result<()> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let header = request.auth.get_auth_header()?;
        *self.counters.last_request.lock().unwrap() = Some((request.date.clone(), header));
        if self.fail_open {
            return Err(Error::fetch("connection refused"));
        }
        self.open = true;
        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        assert!(self.open, "pulled from a stream that is not open");
        let pull = self.counters.pulls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_pull == Some(pull) {
            return Err(Error::fetch("connection reset"));
        }
        Ok(self.lines.pop_front())
    }

    fn disconnect(&mut self) {
        self.open = false;
        self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every batch; accepts at most `accept_limit` rows per call.
#[derive(Default)]
struct RecordingSink {
    batches: Vec<Vec<Row>>,
    accept_limit: Option<usize>,
    overcount: bool,
}

impl RecordingSink {
    fn rows(&self) -> Vec<Row> {
        self.batches.iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl RowSink for RecordingSink {
    async fn write_rows(&mut self, rows: Vec<Row>) -> Result<usize> {
        let submitted = rows.len();
        self.batches.push(rows);
        if self.overcount {
            return Ok(submitted + 1);
        }
        Ok(self.accept_limit.map_or(submitted, |limit| limit.min(submitted)))
    }
}

fn partition() -> PartitionDescriptor {
    PartitionDescriptor::new("2024-03-01", "xoxp-test")
}

fn id_name_schema() -> ColumnSchema {
    ColumnSchema::try_new(vec![
        Column::new("id", ColumnType::Utf8),
        Column::new("name", ColumnType::Utf8),
    ])
    .unwrap()
}

fn reader(source: &Arc<MockSource>, options: ReaderOptions) -> RecordReader {
    RecordReader::new(source.clone(), options).unwrap()
}

fn running() -> impl Fn() -> bool + Send + Sync {
    || true
}

#[tokio::test]
async fn test_missing_field_becomes_null() {
    let source = Arc::new(MockSource::new(&[
        r#"{"id":"1","name":"Alice"}"#,
        r#"{"id":"2"}"#,
        r#"{"id":"3","name":"Carol"}"#,
    ]));
    let mut sink = RecordingSink::default();

    let outcome = reader(&source, ReaderOptions::default())
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap();

    assert_eq!(outcome.state, ReadState::Drained);
    assert_eq!(outcome.lines_read, 3);
    assert_eq!(outcome.rows_written, 3);

    let rows = sink.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get(1).and_then(Cell::as_str), Some("Alice"));
    assert_eq!(rows[1].get(0).and_then(Cell::as_str), Some("2"));
    assert!(rows[1].get(1).unwrap().is_null());
    assert_eq!(rows[2].get(1).and_then(Cell::as_str), Some("Carol"));

    // One row per sink call by default.
    assert_eq!(sink.batches.len(), 3);
    assert_eq!(Counters::get(&source.counters.connects), 1);
    assert_eq!(Counters::get(&source.counters.disconnects), 1);
}

#[tokio::test]
async fn test_request_carries_date_and_bearer_token() {
    let source = Arc::new(MockSource::new(&[]));
    let mut sink = RecordingSink::default();

    let outcome = reader(&source, ReaderOptions::default())
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap();

    assert_eq!(outcome.state, ReadState::Drained);
    assert_eq!(outcome.rows_written, 0);
    let request = source.counters.last_request.lock().unwrap().clone();
    assert_eq!(
        request,
        Some(("2024-03-01".to_string(), "Bearer xoxp-test".to_string()))
    );
}

#[tokio::test]
async fn test_fully_typed_record_has_no_nulls() {
    let schema = ColumnSchema::try_new(vec![
        Column::new("user_id", ColumnType::Utf8),
        Column::new("messages_posted_count", ColumnType::Int64),
        Column::new("is_active", ColumnType::Boolean),
        Column::new("date", ColumnType::Date32),
        Column::new("score", ColumnType::Float64),
    ])
    .unwrap();
    let source = Arc::new(MockSource::new(&[
        r#"{"user_id":"U1","messages_posted_count":12,"is_active":true,"date":"1970-01-02","score":0.5}"#,
    ]));
    let mut sink = RecordingSink::default();

    reader(&source, ReaderOptions::default())
        .read(&partition(), &schema, &mut sink, &running())
        .await
        .unwrap();

    let rows = sink.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), 5);
    assert_eq!(rows[0].null_count(), 0);
    assert_eq!(rows[0].get(1), Some(&Cell::Int64(12)));
    assert_eq!(rows[0].get(3), Some(&Cell::Date32(1)));
}

#[tokio::test]
async fn test_cancelled_before_first_line() {
    let source = Arc::new(MockSource::new(&[r#"{"id":"1"}"#]));
    let mut sink = RecordingSink::default();

    let outcome = reader(&source, ReaderOptions::default())
        .read(&partition(), &id_name_schema(), &mut sink, &|| false)
        .await
        .unwrap();

    assert_eq!(outcome.state, ReadState::Cancelled);
    assert!(outcome.is_cancelled());
    assert_eq!(outcome.rows_emitted(), 0);
    assert!(sink.batches.is_empty());
    assert_eq!(Counters::get(&source.counters.pulls), 0);
    assert_eq!(Counters::get(&source.counters.disconnects), 1);
}

#[tokio::test]
async fn test_cancelled_mid_stream_stops_pulling() {
    let source = Arc::new(MockSource::new(&[
        r#"{"id":"1"}"#,
        r#"{"id":"2"}"#,
        r#"{"id":"3"}"#,
        r#"{"id":"4"}"#,
        r#"{"id":"5"}"#,
    ]));
    let counters = source.counters.clone();
    let status = move || Counters::get(&counters.pulls) < 3;
    let mut sink = RecordingSink::default();

    let outcome = reader(&source, ReaderOptions::default())
        .read(&partition(), &id_name_schema(), &mut sink, &status)
        .await
        .unwrap();

    assert_eq!(outcome.state, ReadState::Cancelled);
    assert_eq!(outcome.lines_read, 3);
    assert_eq!(sink.rows().len(), 3);
    assert_eq!(Counters::get(&source.counters.pulls), 3);
    assert_eq!(Counters::get(&source.counters.disconnects), 1);
}

#[tokio::test]
async fn test_cancellation_flushes_pending_rows() {
    let source = Arc::new(MockSource::new(&[
        r#"{"id":"1"}"#,
        r#"{"id":"2"}"#,
        r#"{"id":"3"}"#,
        r#"{"id":"4"}"#,
    ]));
    let counters = source.counters.clone();
    let status = move || Counters::get(&counters.pulls) < 2;
    let options = ReaderOptions {
        sink_batch_size: 10,
        ..ReaderOptions::default()
    };
    let mut sink = RecordingSink::default();

    let outcome = reader(&source, options)
        .read(&partition(), &id_name_schema(), &mut sink, &status)
        .await
        .unwrap();

    assert_eq!(outcome.state, ReadState::Cancelled);
    assert_eq!(sink.batches.len(), 1);
    assert_eq!(sink.batches[0].len(), 2);
}

#[tokio::test]
async fn test_open_failure_releases_connection() {
    let mut source = MockSource::new(&[r#"{"id":"1"}"#]);
    source.fail_open = true;
    let source = Arc::new(source);
    let mut sink = RecordingSink::default();

    let err = reader(&source, ReaderOptions::default())
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Fetch);
    assert_eq!(err.stage(), Some(ReadState::Fetching));
    assert!(sink.batches.is_empty());
    assert_eq!(Counters::get(&source.counters.pulls), 0);
    assert_eq!(Counters::get(&source.counters.disconnects), 1);
}

#[tokio::test]
async fn test_pull_failure_mid_stream() {
    let mut source = MockSource::new(&[r#"{"id":"1"}"#, r#"{"id":"2"}"#, r#"{"id":"3"}"#]);
    source.fail_pull = Some(2);
    let source = Arc::new(source);
    let mut sink = RecordingSink::default();

    let err = reader(&source, ReaderOptions::default())
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Fetch);
    assert_eq!(err.stage(), Some(ReadState::Parsing));
    assert_eq!(sink.rows().len(), 1);
    assert_eq!(Counters::get(&source.counters.disconnects), 1);
}

#[tokio::test]
async fn test_invalid_json_fails_with_line_number() {
    let source = Arc::new(MockSource::new(&[
        r#"{"id":"1"}"#,
        r#"{"id":"2""#,
        r#"{"id":"3"}"#,
    ]));
    let mut sink = RecordingSink::default();

    let err = reader(&source, ReaderOptions::default())
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(err.stage(), Some(ReadState::Parsing));
    assert!(err.to_string().contains("line 2"), "{}", err);
    assert_eq!(sink.rows().len(), 1);
    assert_eq!(Counters::get(&source.counters.pulls), 2);
    assert_eq!(Counters::get(&source.counters.disconnects), 1);
}

#[tokio::test]
async fn test_blank_line_fails_by_default() {
    let source = Arc::new(MockSource::new(&[r#"{"id":"1"}"#, "", r#"{"id":"3"}"#]));
    let mut sink = RecordingSink::default();

    let err = reader(&source, ReaderOptions::default())
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(Counters::get(&source.counters.disconnects), 1);
}

#[tokio::test]
async fn test_blank_lines_skipped_when_configured() {
    let source = Arc::new(MockSource::new(&[
        r#"{"id":"1"}"#,
        "",
        "   ",
        r#"{"id":"2"}"#,
    ]));
    let options = ReaderOptions {
        blank_lines: LinePolicy::Skip,
        ..ReaderOptions::default()
    };
    let mut sink = RecordingSink::default();

    let outcome = reader(&source, options)
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap();

    assert_eq!(outcome.state, ReadState::Drained);
    assert_eq!(outcome.lines_read, 4);
    assert_eq!(outcome.blank_lines, 2);
    let ids: Vec<_> = sink
        .rows()
        .iter()
        .map(|r| r.get(0).and_then(Cell::as_str).map(str::to_string))
        .collect();
    assert_eq!(ids, vec![Some("1".to_string()), Some("2".to_string())]);
}

#[tokio::test]
async fn test_non_object_line_fails_by_default() {
    let source = Arc::new(MockSource::new(&[
        r#"{"id":"1"}"#,
        r#"["2"]"#,
        r#"{"id":"3"}"#,
    ]));
    let mut sink = RecordingSink::default();

    let err = reader(&source, ReaderOptions::default())
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(err.stage(), Some(ReadState::Parsing));
    assert!(err.to_string().contains("line 2"), "{}", err);
    assert_eq!(sink.rows().len(), 1);
    assert_eq!(Counters::get(&source.counters.pulls), 2);
    assert_eq!(Counters::get(&source.counters.disconnects), 1);
}

#[tokio::test]
async fn test_scalar_and_null_lines_fail_by_default() {
    for line in ["null", "42", r#""text""#] {
        let source = Arc::new(MockSource::new(&[line]));
        let mut sink = RecordingSink::default();

        let err = reader(&source, ReaderOptions::default())
            .read(&partition(), &id_name_schema(), &mut sink, &running())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode, "line {}", line);
        assert!(sink.batches.is_empty());
    }
}

#[tokio::test]
async fn test_non_object_lines_skipped_when_configured() {
    let source = Arc::new(MockSource::new(&[
        r#"{"id":"1"}"#,
        r#"["2"]"#,
        "null",
        "42",
        r#"{"id":"5"}"#,
    ]));
    let options = ReaderOptions {
        non_object_lines: LinePolicy::Skip,
        ..ReaderOptions::default()
    };
    let mut sink = RecordingSink::default();

    let outcome = reader(&source, options)
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap();

    assert_eq!(outcome.state, ReadState::Drained);
    assert_eq!(outcome.lines_read, 5);
    assert_eq!(outcome.rows_skipped, 3);
    assert_eq!(outcome.rows_written, 2);
}

#[tokio::test]
async fn test_strict_coercion_failure() {
    let schema = ColumnSchema::try_new(vec![Column::new("count", ColumnType::Int64)]).unwrap();
    let source = Arc::new(MockSource::new(&[r#"{"count":"many"}"#]));
    let options = ReaderOptions {
        coercion: CoercionPolicy::Strict,
        ..ReaderOptions::default()
    };
    let mut sink = RecordingSink::default();

    let err = reader(&source, options)
        .read(&partition(), &schema, &mut sink, &running())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conversion);
    assert_eq!(err.stage(), Some(ReadState::Emitting));
    assert_eq!(Counters::get(&source.counters.disconnects), 1);
}

#[tokio::test]
async fn test_rows_batched_up_to_sink_batch_size() {
    let lines: Vec<String> = (1..=7).map(|i| format!(r#"{{"id":"{}"}}"#, i)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let source = Arc::new(MockSource::new(&refs));
    let options = ReaderOptions {
        sink_batch_size: 3,
        ..ReaderOptions::default()
    };
    let mut sink = RecordingSink::default();

    let outcome = reader(&source, options)
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap();

    assert_eq!(outcome.rows_written, 7);
    let sizes: Vec<usize> = sink.batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    let last = sink.rows().pop().unwrap();
    assert_eq!(last.get(0).and_then(Cell::as_str), Some("7"));
}

#[tokio::test]
async fn test_rejected_rows_are_counted() {
    let source = Arc::new(MockSource::new(&[
        r#"{"id":"1"}"#,
        r#"{"id":"2"}"#,
        r#"{"id":"3"}"#,
    ]));
    let options = ReaderOptions {
        sink_batch_size: 3,
        ..ReaderOptions::default()
    };
    let mut sink = RecordingSink {
        accept_limit: Some(1),
        ..RecordingSink::default()
    };

    let outcome = reader(&source, options)
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap();

    assert_eq!(outcome.rows_written, 1);
    assert_eq!(outcome.rows_rejected, 2);
    assert_eq!(outcome.rows_emitted(), 3);
}

#[tokio::test]
async fn test_sink_overcount_is_an_error() {
    let source = Arc::new(MockSource::new(&[r#"{"id":"1"}"#]));
    let mut sink = RecordingSink {
        overcount: true,
        ..RecordingSink::default()
    };

    let err = reader(&source, ReaderOptions::default())
        .read(&partition(), &id_name_schema(), &mut sink, &running())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Sink);
    assert_eq!(err.stage(), Some(ReadState::Emitting));
    assert_eq!(Counters::get(&source.counters.disconnects), 1);
}

#[tokio::test]
async fn test_invalid_partition_never_connects() {
    let source = Arc::new(MockSource::new(&[r#"{"id":"1"}"#]));
    let mut sink = RecordingSink::default();
    let bad = PartitionDescriptor::new("03/01/2024", "xoxp-test");

    let err = reader(&source, ReaderOptions::default())
        .read(&bad, &id_name_schema(), &mut sink, &running())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.stage(), Some(ReadState::Init));
    assert_eq!(Counters::get(&source.counters.connects), 0);
}

#[tokio::test]
async fn test_reader_is_reusable_across_partitions() {
    let source = Arc::new(MockSource::new(&[r#"{"id":"1"}"#, r#"{"id":"2"}"#]));
    let reader = reader(&source, ReaderOptions::default());

    for _ in 0..2 {
        let mut sink = RecordingSink::default();
        let outcome = reader
            .read(&partition(), &id_name_schema(), &mut sink, &running())
            .await
            .unwrap();
        assert_eq!(outcome.rows_written, 2);
    }
    assert_eq!(Counters::get(&source.counters.connects), 2);
    assert_eq!(Counters::get(&source.counters.disconnects), 2);
}

#[test]
fn test_invalid_options_rejected() {
    let source = Arc::new(MockSource::new(&[]));
    let options = ReaderOptions {
        sink_batch_size: 11,
        ..ReaderOptions::default()
    };
    assert!(RecordReader::new(source, options).is_err());
}
