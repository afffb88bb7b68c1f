// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Google Cloud Client Libraries for Rust - Bigtable Table Admin
//!
//! This crate contains a client for the table administration RPCs of
//! [Cloud Bigtable]. The client wraps a [stub::TableAdmin] with the retry,
//! polling, and pagination helpers from `gax` and `lro`:
//!
//! * [generate_consistency_token()] and [check_consistency()] are unary RPCs,
//!   retried according to the client's retry and backoff policies.
//! * [async_wait_for_consistency()] polls until a table is consistent, and
//!   returns a handle that can be awaited or cancelled.
//! * [list_tables()] returns the tables in an instance, one page or one item
//!   at a time.
//!
//! [Cloud Bigtable]: https://cloud.google.com/bigtable
//! [generate_consistency_token()]: client::BigtableTableAdmin::generate_consistency_token
//! [check_consistency()]: client::BigtableTableAdmin::check_consistency
//! [async_wait_for_consistency()]: client::BigtableTableAdmin::async_wait_for_consistency
//! [list_tables()]: client::BigtableTableAdmin::list_tables

pub use gax::Result;
pub use gax::error::Error;

pub mod builder;
pub mod client;
pub mod model;
pub mod stub;
