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

//! Clients for fetching analytics records from the data endpoint.
//!
//! This module provides:
//! - `LineSource` / `LineStream` traits: the seam between the read loop and
//!   the network, so the loop can be driven by any line-oriented source
//! - `AnalyticsHttpClient`: reqwest client with timeouts and status handling
//! - `HttpLineSource`: streams an NDJSON response body line by line

pub mod http;
pub mod line_stream;

use crate::auth::{AuthProvider, BearerToken};
use crate::error::Result;
use crate::types::PartitionDescriptor;
use async_trait::async_trait;
use std::sync::Arc;

pub use http::{AnalyticsHttpClient, HttpClientConfig};
pub use line_stream::{build_request_url, HttpLineSource, HttpLineStream};

/// Value of the fixed `type` query parameter.
pub const RECORD_TYPE: &str = "member";

/// What to fetch for one partition.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub date: String,
    pub auth: Arc<dyn AuthProvider>,
}

impl FetchRequest {
    pub fn for_partition(partition: &PartitionDescriptor) -> Self {
        Self {
            date: partition.date().to_string(),
            auth: Arc::new(BearerToken::new(partition.auth_token())),
        }
    }
}

/// A forward-only sequence of text lines backed by one connection.
///
/// `disconnect` releases the connection. It is idempotent, and safe to call
/// before `open` or after `open` failed. After it, `next_line` returns
/// `Ok(None)`.
#[async_trait]
pub trait LineStream: Send {
    /// Establish the connection and start reading the body.
    async fn open(&mut self, request: &FetchRequest) -> Result<()>;

    /// Next line without its terminator, or `None` at end of body.
    async fn next_line(&mut self) -> Result<Option<String>>;

    fn disconnect(&mut self);
}

/// Creates unopened line streams, one per read attempt.
pub trait LineSource: Send + Sync + std::fmt::Debug {
    fn connect(&self) -> Box<dyn LineStream>;
}
