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

//! Google APIs helpers.
//!
//! This crate contains the types and functions used to implement the
//! retry, backoff, polling, and pagination behavior of the Google Cloud client
//! libraries:
//!
//! * [error]: the error type returned by all the client libraries, and the
//!   canonical status codes.
//! * [retry_policy], [backoff_policy], and [polling_policy]: traits and
//!   common implementations to control retry and polling loops.
//! * [completion_queue]: schedules cancellable requests and timers.
//! * [retry_loop]: runs a request until it succeeds, fails with a permanent
//!   error, or the retry policy is exhausted.
//! * [stream_range]: converts paginated list RPCs into a stream of items.
//! * [options]: client configuration and per-request options.

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all functions wrapping RPCs.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

pub mod backoff_policy;
pub mod completion_queue;
pub mod error;
pub mod exponential_backoff;
pub mod options;
pub mod polling_policy;
pub mod retry_loop;
pub mod retry_policy;
pub mod retry_result;
pub mod stream_range;
