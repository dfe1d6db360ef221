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

//! Line-by-line streaming of an NDJSON response body.
//!
//! The body is consumed as a byte stream and split on `\n` as it arrives;
//! nothing beyond the reader's buffer is held in memory. A trailing `\r` is
//! stripped. A line that is not valid UTF-8 is a decode error, while a failed
//! body read is a fetch error.

use crate::client::{AnalyticsHttpClient, FetchRequest, LineSource, LineStream, RECORD_TYPE};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Url;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Split};
use tokio_util::io::StreamReader;
use tracing::debug;

type BodyLines = Split<Pin<Box<dyn AsyncBufRead + Send>>>;

/// Build `<base>?date=<date>&type=member`, keeping any query parameters
/// already present on the base URL.
pub fn build_request_url(base_url: &str, date: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| Error::fetch(format!("Invalid data endpoint '{}': {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::fetch(format!(
            "Invalid data endpoint '{}': not a hierarchical URL",
            base_url
        )));
    }
    url.query_pairs_mut()
        .append_pair("date", date)
        .append_pair("type", RECORD_TYPE);
    Ok(url)
}

/// Creates [`HttpLineStream`]s against a fixed data endpoint.
#[derive(Debug, Clone)]
pub struct HttpLineSource {
    http_client: Arc<AnalyticsHttpClient>,
    base_url: String,
}

impl HttpLineSource {
    pub fn new(http_client: Arc<AnalyticsHttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl LineSource for HttpLineSource {
    fn connect(&self) -> Box<dyn LineStream> {
        Box::new(HttpLineStream::new(
            self.http_client.clone(),
            self.base_url.clone(),
        ))
    }
}

enum StreamState {
    Idle,
    Open(BodyLines),
    Closed,
}

/// One GET request whose body is read as lines.
pub struct HttpLineStream {
    http_client: Arc<AnalyticsHttpClient>,
    base_url: String,
    state: StreamState,
    lines_read: u64,
}

impl std::fmt::Debug for HttpLineStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            StreamState::Idle => "idle",
            StreamState::Open(_) => "open",
            StreamState::Closed => "closed",
        };
        f.debug_struct("HttpLineStream")
            .field("base_url", &self.base_url)
            .field("state", &state)
            .field("lines_read", &self.lines_read)
            .finish()
    }
}

impl HttpLineStream {
    pub fn new(http_client: Arc<AnalyticsHttpClient>, base_url: String) -> Self {
        Self {
            http_client,
            base_url,
            state: StreamState::Idle,
            lines_read: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, StreamState::Open(_))
    }
}

#[async_trait]
impl LineStream for HttpLineStream {
    async fn open(&mut self, request: &FetchRequest) -> Result<()> {
        match self.state {
            StreamState::Idle => {}
            StreamState::Open(_) => return Err(Error::fetch("line stream is already open")),
            StreamState::Closed => return Err(Error::fetch("line stream has been disconnected")),
        }

        let url = build_request_url(&self.base_url, &request.date)?;
        let response = self.http_client.get(url, request.auth.as_ref()).await?;

        let body = response.bytes_stream().map_err(std::io::Error::other);
        let reader: Pin<Box<dyn AsyncBufRead + Send>> = Box::pin(StreamReader::new(body));
        self.state = StreamState::Open(reader.split(b'\n'));

        debug!("Opened line stream for date {}", request.date);
        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        let lines = match self.state {
            StreamState::Open(ref mut lines) => lines,
            StreamState::Closed => return Ok(None),
            StreamState::Idle => return Err(Error::fetch("line stream is not open")),
        };

        let segment = lines
            .next_segment()
            .await
            .map_err(|e| Error::fetch(format!("Failed to read response body: {}", e)))?;
        let Some(mut bytes) = segment else {
            return Ok(None);
        };
        self.lines_read += 1;

        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        let line = String::from_utf8(bytes).map_err(|e| {
            Error::decode(self.lines_read, format!("line is not valid UTF-8: {}", e))
        })?;
        Ok(Some(line))
    }

    fn disconnect(&mut self) {
        if let StreamState::Open(_) = self.state {
            debug!("Disconnecting line stream after {} lines", self.lines_read);
        }
        self.state = StreamState::Closed;
    }
}
