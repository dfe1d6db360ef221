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

//! Error types for the connector.
//!
//! Every fallible operation returns [`Result`]. Stream-level failures raised
//! inside the read loop are wrapped in [`Error::Read`] so the caller can tell
//! which stage of the loop gave up; [`Error::kind`] looks through that
//! wrapper to the root cause.

use crate::reader::ReadState;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Fetch,
    Decode,
    Conversion,
    Sink,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing partition fields, schema, or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Connection, HTTP status, or body read failure.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// A line of the response body is not valid JSON.
    #[error("decode error at line {line}: {message}")]
    Decode { line: u64, message: String },

    /// A field could not be coerced and the strict policy is in effect.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The output sink refused a batch or returned an impossible count.
    #[error("sink error: {0}")]
    Sink(String),

    /// A read attempt failed in the given stage.
    #[error("read failed while {stage}: {source}")]
    Read {
        stage: ReadState,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    pub fn decode(line: u64, message: impl Into<String>) -> Self {
        Self::Decode {
            line,
            message: message.into(),
        }
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }

    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink(message.into())
    }

    /// Wrap this error with the loop stage it was raised in.
    ///
    /// Already-wrapped errors are returned unchanged so the innermost stage
    /// is the one reported.
    pub fn in_stage(self, stage: ReadState) -> Self {
        match self {
            Self::Read { .. } => self,
            other => Self::Read {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Kind of the root cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Conversion(_) => ErrorKind::Conversion,
            Self::Sink(_) => ErrorKind::Sink,
            Self::Read { source, .. } => source.kind(),
        }
    }

    /// Stage the error was raised in, if it came out of the read loop.
    pub fn stage(&self) -> Option<ReadState> {
        match self {
            Self::Read { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
