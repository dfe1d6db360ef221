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

//! Connector configuration.
//!
//! Configuration is set through string-keyed options or loaded from the
//! environment, and is validated once before a handler is built.

use crate::client::HttpClientConfig;
use crate::error::{Error, Result};
use crate::logging::LogConfig;
use crate::reader::{CoercionPolicy, LinePolicy, ReaderOptions};
use crate::sink::DEFAULT_MAX_ROWS_PER_BLOCK;
use crate::types::ColumnSchema;
use reqwest::Url;
use std::collections::BTreeMap;
use std::time::Duration;

/// Environment variable holding the data endpoint.
pub const ENV_DATA_ENDPOINT: &str = "data_endpoint";
/// Environment variable holding the log level.
pub const ENV_LOG_LEVEL: &str = "log_level";
/// Environment variable holding the log file path.
pub const ENV_LOG_FILE: &str = "log_file";

/// Option prefix declaring a table schema: `slack.schema.<table>` holds a
/// JSON column list.
pub const SCHEMA_OPTION_PREFIX: &str = "slack.schema.";

/// Everything needed to build a record handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorConfig {
    /// Base URL of the analytics data endpoint.
    pub data_endpoint: Option<String>,
    pub http: HttpClientConfig,
    pub reader: ReaderOptions,
    pub log: LogConfig,
    /// Rows per sealed block of the Arrow sink.
    pub max_rows_per_block: usize,
    /// Table schemas declared through `slack.schema.<table>`, keyed by
    /// lowercase table name.
    pub table_schemas: BTreeMap<String, ColumnSchema>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            data_endpoint: None,
            http: HttpClientConfig::default(),
            reader: ReaderOptions::default(),
            log: LogConfig::default(),
            max_rows_per_block: DEFAULT_MAX_ROWS_PER_BLOCK,
            table_schemas: BTreeMap::new(),
        }
    }
}

impl ConnectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the endpoint and logging settings from the process environment.
    /// Everything else keeps its default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            data_endpoint: non_empty(ENV_DATA_ENDPOINT),
            log: LogConfig {
                level: non_empty(ENV_LOG_LEVEL),
                file: non_empty(ENV_LOG_FILE),
            },
            ..Self::default()
        }
    }

    /// Returns the configured data endpoint.
    pub fn data_endpoint(&self) -> Option<&str> {
        self.data_endpoint.as_deref()
    }

    /// Schema declared for a table, if any.
    pub fn table_schema(&self, table_name: &str) -> Option<&ColumnSchema> {
        self.table_schemas.get(&table_name.to_lowercase())
    }

    fn set_table_schema(&mut self, table_name: &str, value: &str) -> Result<()> {
        if table_name.trim().is_empty() {
            return Err(Error::validation(format!(
                "option '{}' needs a table name",
                SCHEMA_OPTION_PREFIX
            )));
        }
        let schema = ColumnSchema::from_json(value)?;
        self.table_schemas.insert(table_name.to_lowercase(), schema);
        Ok(())
    }

    fn parse_int_option(key: &str, value: &str) -> Result<u64> {
        value
            .trim()
            .parse()
            .map_err(|_| Self::invalid_option(key, value))
    }

    fn invalid_option(key: &str, value: &str) -> Error {
        Error::validation(format!("invalid value '{}' for option '{}'", value, key))
    }

    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(table_name) = key.strip_prefix(SCHEMA_OPTION_PREFIX) {
            return self.set_table_schema(table_name, value);
        }

        match key {
            "slack.data_endpoint" => {
                self.data_endpoint = Some(value.to_string());
            }
            "slack.log_level" => {
                self.log.level = Some(value.to_string());
            }
            "slack.log_file" => {
                self.log.file = Some(value.to_string());
            }

            // HTTP client options
            "slack.http.connect_timeout_ms" => {
                let v = Self::parse_int_option(key, value)?;
                self.http.connect_timeout = Duration::from_millis(v);
            }
            "slack.http.read_timeout_ms" => {
                let v = Self::parse_int_option(key, value)?;
                self.http.read_timeout = Duration::from_millis(v);
            }
            "slack.http.max_connections_per_host" => {
                let v = Self::parse_int_option(key, value)?;
                self.http.max_connections_per_host = v as usize;
            }
            "slack.http.user_agent" => {
                self.http.user_agent = value.to_string();
            }

            // Reader options
            "slack.reader.sink_batch_size" => {
                let v = Self::parse_int_option(key, value)?;
                self.reader.sink_batch_size = v as usize;
            }
            "slack.reader.blank_lines" => {
                self.reader.blank_lines = value.parse::<LinePolicy>()?;
            }
            "slack.reader.non_object_lines" => {
                self.reader.non_object_lines = value.parse::<LinePolicy>()?;
            }
            "slack.reader.coercion" => {
                self.reader.coercion = value.parse::<CoercionPolicy>()?;
            }

            "slack.sink.max_rows_per_block" => {
                let v = Self::parse_int_option(key, value)?;
                self.max_rows_per_block = v as usize;
            }

            _ => return Err(Error::validation(format!("unknown option '{}'", key))),
        }
        Ok(())
    }

    pub fn get_option(&self, key: &str) -> Result<String> {
        let not_set = || Error::validation(format!("option '{}' is not set", key));
        if let Some(table_name) = key.strip_prefix(SCHEMA_OPTION_PREFIX) {
            let schema = self.table_schema(table_name).ok_or_else(not_set)?;
            return serde_json::to_string(schema.columns())
                .map_err(|e| Error::validation(format!("Failed to encode schema: {}", e)));
        }

        let value = match key {
            "slack.data_endpoint" => self.data_endpoint.clone().ok_or_else(not_set)?,
            "slack.log_level" => self.log.level.clone().ok_or_else(not_set)?,
            "slack.log_file" => self.log.file.clone().ok_or_else(not_set)?,
            "slack.http.connect_timeout_ms" => self.http.connect_timeout.as_millis().to_string(),
            "slack.http.read_timeout_ms" => self.http.read_timeout.as_millis().to_string(),
            "slack.http.max_connections_per_host" => {
                self.http.max_connections_per_host.to_string()
            }
            "slack.http.user_agent" => self.http.user_agent.clone(),
            "slack.reader.sink_batch_size" => self.reader.sink_batch_size.to_string(),
            "slack.reader.blank_lines" => self.reader.blank_lines.as_str().to_string(),
            "slack.reader.non_object_lines" => self.reader.non_object_lines.as_str().to_string(),
            "slack.reader.coercion" => match self.reader.coercion {
                CoercionPolicy::Lenient => "lenient".to_string(),
                CoercionPolicy::Strict => "strict".to_string(),
            },
            "slack.sink.max_rows_per_block" => self.max_rows_per_block.to_string(),
            _ => return Err(Error::validation(format!("unknown option '{}'", key))),
        };
        Ok(value)
    }

    /// Check the endpoint and option ranges.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self
            .data_endpoint
            .as_deref()
            .ok_or_else(|| Error::validation("data endpoint not set"))?;
        let url = Url::parse(endpoint).map_err(|e| {
            Error::validation(format!("invalid data endpoint '{}': {}", endpoint, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(Error::validation(format!(
                "data endpoint '{}' must be an absolute http(s) URL",
                endpoint
            )));
        }

        self.reader.validate()?;

        if self.max_rows_per_block == 0 {
            return Err(Error::validation("max_rows_per_block must be greater than 0"));
        }
        if self.http.connect_timeout.is_zero() || self.http.read_timeout.is_zero() {
            return Err(Error::validation("HTTP timeouts must be greater than 0"));
        }
        Ok(())
    }
}
