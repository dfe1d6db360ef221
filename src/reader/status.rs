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

//! Liveness check for the query a read belongs to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Polled once per loop iteration; once it reports `false` the read stops
/// pulling lines.
pub trait QueryStatusChecker: Send + Sync {
    fn is_query_running(&self) -> bool;
}

impl QueryStatusChecker for CancellationToken {
    fn is_query_running(&self) -> bool {
        !self.is_cancelled()
    }
}

/// `true` while the query is running.
impl QueryStatusChecker for Arc<AtomicBool> {
    fn is_query_running(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl<F> QueryStatusChecker for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_query_running(&self) -> bool {
        self()
    }
}
