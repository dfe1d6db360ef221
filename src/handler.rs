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

//! Record handler wiring the read loop into a query host.
//!
//! The host hands over a table name and the split properties of one
//! partition. The handler extracts the partition, resolves the schema and
//! runs the read loop against the configured data endpoint.

use crate::client::{AnalyticsHttpClient, HttpLineSource, LineSource};
use crate::config::ConnectorConfig;
use crate::error::{Error, Result};
use crate::logging::init_logging;
use crate::reader::{QueryStatusChecker, ReadOutcome, RecordReader};
use crate::sink::{BlockSpiller, RowSink};
use crate::types::schema::member_analytics;
use crate::types::{ColumnSchema, PartitionDescriptor};
use arrow_array::RecordBatch;
use arrow_schema::Schema;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle as RuntimeHandle;
use tracing::{debug, error};

/// Source type reported to the host.
pub const SOURCE_TYPE: &str = "slackanalytics";

/// Built-in schema for a table name, if the table is known.
pub fn table_schema(table_name: &str) -> Option<ColumnSchema> {
    match table_name.to_lowercase().as_str() {
        "member" | "member_analytics" => Some(member_analytics()),
        _ => None,
    }
}

/// One partition read as requested by the host.
#[derive(Debug, Clone)]
pub struct ReadRecordsRequest {
    pub table_name: String,
    pub split_properties: HashMap<String, String>,
    /// Requested columns. When unset, the schema is resolved from the table name.
    pub schema: Option<ColumnSchema>,
}

impl ReadRecordsRequest {
    pub fn new(table_name: impl Into<String>, split_properties: HashMap<String, String>) -> Self {
        Self {
            table_name: table_name.into(),
            split_properties,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: ColumnSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Request the columns of an Arrow schema handed over by the host.
    pub fn with_arrow_schema(self, schema: &Schema) -> Result<Self> {
        Ok(self.with_schema(ColumnSchema::from_arrow(schema)?))
    }
}

/// Reads member analytics partitions for a query host.
pub struct MemberAnalyticsRecordHandler {
    config: ConnectorConfig,
    reader: RecordReader,
    /// Tokio runtime handle for the blocking entry point.
    runtime_handle: RuntimeHandle,
}

impl std::fmt::Debug for MemberAnalyticsRecordHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberAnalyticsRecordHandler")
            .field("data_endpoint", &self.config.data_endpoint)
            .field("reader", &self.reader)
            .finish()
    }
}

impl MemberAnalyticsRecordHandler {
    /// Build a handler reading from the configured data endpoint.
    pub fn new(config: ConnectorConfig, runtime_handle: RuntimeHandle) -> Result<Self> {
        config.validate()?;
        init_logging(&config.log);

        let endpoint = config
            .data_endpoint()
            .ok_or_else(|| Error::validation("data endpoint not set"))?
            .to_string();
        let http_client = Arc::new(AnalyticsHttpClient::new(config.http.clone())?);
        let source: Arc<dyn LineSource> = Arc::new(HttpLineSource::new(http_client, endpoint));

        Self::with_source(config, source, runtime_handle)
    }

    /// Build a handler reading from an arbitrary line source. The data
    /// endpoint of `config` is not used.
    pub fn with_source(
        config: ConnectorConfig,
        source: Arc<dyn LineSource>,
        runtime_handle: RuntimeHandle,
    ) -> Result<Self> {
        if config.max_rows_per_block == 0 {
            return Err(Error::validation("max_rows_per_block must be greater than 0"));
        }
        let reader = RecordReader::new(source, config.reader.clone())?;
        Ok(Self {
            config,
            reader,
            runtime_handle,
        })
    }

    pub fn source_type(&self) -> &'static str {
        SOURCE_TYPE
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Schema for a request: the requested columns, else a schema declared
    /// in the configuration, else the table's built-in one.
    pub fn resolve_schema(&self, request: &ReadRecordsRequest) -> Result<ColumnSchema> {
        if let Some(ref schema) = request.schema {
            return Ok(schema.clone());
        }
        if let Some(schema) = self.config.table_schema(&request.table_name) {
            return Ok(schema.clone());
        }
        table_schema(&request.table_name)
            .ok_or_else(|| Error::validation(format!("unknown table '{}'", request.table_name)))
    }

    /// An Arrow sink sized from the configuration.
    pub fn new_spiller(&self, schema: ColumnSchema) -> Result<BlockSpiller> {
        BlockSpiller::new(schema, self.config.max_rows_per_block)
    }

    /// Read one partition into `sink`.
    pub async fn read_records(
        &self,
        request: &ReadRecordsRequest,
        sink: &mut dyn RowSink,
        status: &dyn QueryStatusChecker,
    ) -> Result<ReadOutcome> {
        debug!("read_records: enter table={}", request.table_name);

        let result = self.read_partition(request, sink, status).await;
        match result {
            Ok(ref outcome) => debug!(
                "read_records: exit table={} state={} rows={}",
                request.table_name, outcome.state, outcome.rows_written
            ),
            Err(ref e) => error!("read_records: table={} error - {}", request.table_name, e),
        }
        result
    }

    async fn read_partition(
        &self,
        request: &ReadRecordsRequest,
        sink: &mut dyn RowSink,
        status: &dyn QueryStatusChecker,
    ) -> Result<ReadOutcome> {
        let partition = PartitionDescriptor::from_split_properties(&request.split_properties)?;
        let schema = self.resolve_schema(request)?;
        self.reader.read(&partition, &schema, sink, status).await
    }

    /// Read one partition into a fresh Arrow sink and return its blocks.
    pub async fn read_to_batches(
        &self,
        request: &ReadRecordsRequest,
        status: &dyn QueryStatusChecker,
    ) -> Result<(ReadOutcome, Vec<RecordBatch>)> {
        let schema = self.resolve_schema(request)?;
        let mut spiller = self.new_spiller(schema)?;
        let outcome = self.read_records(request, &mut spiller, status).await?;
        Ok((outcome, spiller.finish()?))
    }

    /// Blocking form of [`Self::read_records`] for synchronous hosts.
    ///
    /// Must not be called from within an async context of the same runtime.
    pub fn read_with_constraint(
        &self,
        request: &ReadRecordsRequest,
        sink: &mut dyn RowSink,
        status: &dyn QueryStatusChecker,
    ) -> Result<ReadOutcome> {
        self.runtime_handle
            .block_on(self.read_records(request, sink, status))
    }
}
