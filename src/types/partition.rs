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

//! Partition descriptors and the split properties they are built from.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Split property holding the day to fetch.
pub const SPLIT_DATE_PROPERTY: &str = "date";
/// Split property holding the bearer token.
pub const SPLIT_AUTH_TOKEN_PROPERTY: &str = "authToken";

/// One unit of work: a day of analytics and the credentials to fetch it.
#[derive(Clone, PartialEq, Eq)]
pub struct PartitionDescriptor {
    date: String,
    auth_token: String,
}

impl PartitionDescriptor {
    pub fn new(date: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Build a descriptor from split properties.
    pub fn from_split_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let date = properties.get(SPLIT_DATE_PROPERTY).ok_or_else(|| {
            Error::validation(format!("split property '{}' is missing", SPLIT_DATE_PROPERTY))
        })?;
        let auth_token = properties.get(SPLIT_AUTH_TOKEN_PROPERTY).ok_or_else(|| {
            Error::validation(format!(
                "split property '{}' is missing",
                SPLIT_AUTH_TOKEN_PROPERTY
            ))
        })?;
        Ok(Self::new(date.as_str(), auth_token.as_str()))
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Check the date is a `YYYY-MM-DD` day and the token is present.
    pub fn validate(&self) -> Result<()> {
        if self.date.trim().is_empty() {
            return Err(Error::validation("partition date is empty"));
        }
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|e| {
            Error::validation(format!(
                "partition date '{}' is not YYYY-MM-DD: {}",
                self.date, e
            ))
        })?;
        if self.auth_token.trim().is_empty() {
            return Err(Error::validation("partition auth token is empty"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for PartitionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionDescriptor")
            .field("date", &self.date)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}
