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

//! Logging setup for the connector.
//!
//! Installs a `tracing-subscriber` writing to a file or stderr.
//!
//! ## Configuration priority
//!
//! 1. `slack.log_level` / `slack.log_file` options (or the `log_level` /
//!    `log_file` environment variables read by `ConnectorConfig::from_env`)
//! 2. `RUST_LOG` environment variable
//! 3. Default: `warn`
//!
//! ```bash
//! RUST_LOG=slack_analytics_connector=debug ./host
//! ```

use std::sync::OnceLock;
use tracing_subscriber::{
    fmt::{self, time::SystemTime, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_TARGET: &str = "slack_analytics_connector";

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Log level: "OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE".
    ///
    /// A value holding `=` or `,` is taken as a list of filter directives,
    /// e.g. `warn,slack_analytics_connector::reader=trace`.
    pub level: Option<String>,
    /// Log file path. If unset, logs go to stderr.
    pub file: Option<String>,
}

impl LogConfig {
    fn directives(&self) -> Option<String> {
        let level = self.level.as_deref()?.trim();
        if level.contains('=') || level.contains(',') {
            Some(level.to_string())
        } else {
            Some(format!("{}={}", LOG_TARGET, level.to_lowercase()))
        }
    }

    fn filter(&self) -> EnvFilter {
        match self.directives() {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{}=warn", LOG_TARGET))),
        }
    }

    fn is_off(&self) -> bool {
        self.level
            .as_deref()
            .is_some_and(|level| level.trim().eq_ignore_ascii_case("off"))
    }

    /// Writer for the configured destination and whether it takes ANSI colors.
    fn writer(&self) -> std::io::Result<(BoxMakeWriter, bool)> {
        match self.file {
            Some(ref path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Ok((BoxMakeWriter::new(file), false))
            }
            None => Ok((BoxMakeWriter::new(std::io::stderr), true)),
        }
    }
}

/// Initialize the tracing subscriber.
///
/// Runs at most once per process; the first handler constructed decides
/// the configuration and later calls are no-ops. A subscriber installed by
/// the host process takes precedence (`try_init` fails quietly).
pub fn init_logging(config: &LogConfig) {
    LOGGING_INITIALIZED.get_or_init(|| {
        if config.is_off() {
            return;
        }

        let (writer, ansi) = match config.writer() {
            Ok(w) => w,
            Err(e) => {
                eprintln!(
                    "slack-analytics: failed to open log file {}: {}",
                    config.file.as_deref().unwrap_or_default(),
                    e
                );
                return;
            }
        };

        tracing_subscriber::registry()
            .with(config.filter())
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(ansi)
                    .with_timer(SystemTime),
            )
            .try_init()
            .ok();
    });
}
