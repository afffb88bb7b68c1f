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

mod core_error;
pub use core_error::*;

/// Status codes and status values returned by Service RPCs.
///
/// The client libraries distinguish between errors detected while trying to
/// send a RPC (e.g. cannot open a connection), errors generated by the retry
/// and polling loops (e.g. an exhausted policy, or a cancelled operation), and
/// errors returned by the service itself.
///
/// The types in this module represent the information returned by the
/// services, or synthesized from client-side errors.
///
/// # Examples
///
/// ```
/// # use gcloud_gax::error;
/// use error::Error;
/// use error::rpc::Code;
/// fn handle_error(e: Error) {
///     if e.code() == Code::Unavailable {
///         println!("the service is not available right now: {e}");
///     }
/// }
/// ```
pub mod rpc;
