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

//! Slack Member Analytics connector for Rust
//!
//! This crate reads one partition (one day) of Slack member analytics
//! records from an HTTP data endpoint and turns them into typed rows for a
//! query host.
//!
//! ## Overview
//!
//! - [`MemberAnalyticsRecordHandler`] - Entry point used by the host
//! - [`RecordReader`] - The fetch-parse-emit loop for one partition
//! - [`HttpLineSource`] - Streams the NDJSON response body line by line
//! - [`BlockSpiller`] - Arrow sink sealing rows into `RecordBatch` blocks
//!
//! ## Example
//!
//! ```ignore
//! use slack_analytics_connector::{ConnectorConfig, MemberAnalyticsRecordHandler, ReadRecordsRequest};
//! use std::collections::HashMap;
//!
//! let mut config = ConnectorConfig::from_env();
//! config.set_option("slack.reader.sink_batch_size", "10")?;
//!
//! let handler = MemberAnalyticsRecordHandler::new(config, tokio::runtime::Handle::current())?;
//! let properties = HashMap::from([
//!     ("date".to_string(), "2024-03-01".to_string()),
//!     ("authToken".to_string(), "xoxp-...".to_string()),
//! ]);
//! let request = ReadRecordsRequest::new("member_analytics", properties);
//! let (outcome, batches) = handler.read_to_batches(&request, &|| true).await?;
//! ```
//!
//! ## Configuration Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `slack.data_endpoint` | | Base URL of the data endpoint (env `data_endpoint`) |
//! | `slack.log_level` | | Log level (env `log_level`) |
//! | `slack.log_file` | | Log file path (env `log_file`) |
//! | `slack.http.connect_timeout_ms` | 30000 | Connect timeout |
//! | `slack.http.read_timeout_ms` | 60000 | Timeout per body read |
//! | `slack.http.max_connections_per_host` | 16 | Idle pool size per host |
//! | `slack.http.user_agent` | `slack-analytics-connector/<version>` | User agent |
//! | `slack.reader.sink_batch_size` | 1 | Rows per sink call, 1 to 10 |
//! | `slack.reader.blank_lines` | fail | `fail` or `skip` |
//! | `slack.reader.non_object_lines` | fail | `fail` or `skip` for arrays, scalars and `null` |
//! | `slack.reader.coercion` | lenient | `lenient` or `strict` |
//! | `slack.sink.max_rows_per_block` | 10000 | Rows per Arrow block |
//! | `slack.schema.<table>` | | JSON column list overriding a table's schema |

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod reader;
pub mod sink;
pub mod types;

// Re-export main types
pub use config::ConnectorConfig;
pub use error::{Error, ErrorKind, Result};
pub use handler::{MemberAnalyticsRecordHandler, ReadRecordsRequest};
pub use reader::{
    CoercionPolicy, LinePolicy, QueryStatusChecker, ReadOutcome, ReadState, ReaderOptions,
    RecordReader,
};
pub use sink::{BlockSpiller, RowSink};
pub use types::{Cell, Column, ColumnSchema, ColumnType, PartitionDescriptor, Row};

// Re-export client types for advanced users
pub use client::{AnalyticsHttpClient, HttpClientConfig, HttpLineSource, LineSource, LineStream};
