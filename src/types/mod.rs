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

//! Type definitions for the connector.
//!
//! - `partition`: the unit of work and the split properties it comes from
//! - `schema`: column schemas and their Arrow mapping
//! - `row`: converted rows and cells

pub mod partition;
pub mod row;
pub mod schema;

pub use partition::PartitionDescriptor;
pub use row::{Cell, Row};
pub use schema::{Column, ColumnSchema, ColumnType};
