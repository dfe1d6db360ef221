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

//! HTTP client for the analytics data endpoint.
//!
//! This module provides a low-level HTTP client with:
//! - Connection pooling
//! - Bearer token authentication
//! - Configurable connect and per-read timeouts
//!
//! Requests are not retried; a failed request fails the read attempt.

use crate::auth::AuthProvider;
use crate::error::{Error, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, Url};
use std::time::Duration;
use tracing::debug;

/// Configuration for the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Maximum time to wait for each read of the response body.
    pub read_timeout: Duration,
    /// Maximum number of idle connections per host.
    pub max_connections_per_host: usize,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            max_connections_per_host: 16,
            user_agent: format!("slack-analytics-connector/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client for communicating with the analytics endpoint.
#[derive(Debug)]
pub struct AnalyticsHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AnalyticsHttpClient {
    /// Creates a new HTTP client with the given configuration.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_max_idle_per_host(config.max_connections_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::fetch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Issue an authenticated GET and return the response once its status
    /// is known to be successful. The body is left unread.
    pub async fn get(&self, url: Url, auth: &dyn AuthProvider) -> Result<Response> {
        let auth_header = auth.get_auth_header()?;

        debug!("Executing GET {}", redact_query(&url));

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, auth_header)
            .send()
            .await
            .map_err(|e| Error::fetch(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            debug!("Response status {}", status);
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        Err(Error::fetch(format!(
            "HTTP {} - {}",
            status.as_u16(),
            error_body.trim()
        )))
    }
}

/// Path of the URL without its query string, for logging.
fn redact_query(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
