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

//! Traits to mock the clients in this library.
//!
//! Application developers may need to mock the clients in this library to test
//! how their application works with different (and sometimes hard to trigger)
//! client and service behavior. Such test can define mocks implementing the
//! trait(s) defined in this module, initialize the client with an instance of
//! this mock in their tests, and verify their application responds as expected.

use crate::model;
use gax::Result;
use gax::error::Error;
use gax::error::rpc::{Code, Status};
use gax::options::RequestOptions;

/// Defines the trait used to implement [crate::client::BigtableTableAdmin].
///
/// Application developers may need to implement this trait to mock
/// `client::BigtableTableAdmin`. In other use-cases, application developers
/// only use `client::BigtableTableAdmin` and need not be concerned with this
/// trait or its implementations.
///
/// Each method implements a single attempt of the RPC. The client wraps these
/// calls in retry loops and polling loops as needed.
///
/// Services gain new RPCs routinely. Consequently, this trait gains new methods
/// too. To avoid breaking applications the trait provides a default
/// implementation of each method. These implementations return an error with
/// the `Unimplemented` code.
#[async_trait::async_trait]
pub trait TableAdmin: std::fmt::Debug + Send + Sync {
    /// Implements [crate::client::BigtableTableAdmin::list_tables].
    async fn list_tables(
        &self,
        _req: model::ListTablesRequest,
        _options: RequestOptions,
    ) -> Result<model::ListTablesResponse> {
        Err(unimplemented("list_tables"))
    }

    /// Implements [crate::client::BigtableTableAdmin::generate_consistency_token].
    async fn generate_consistency_token(
        &self,
        _req: model::GenerateConsistencyTokenRequest,
        _options: RequestOptions,
    ) -> Result<model::GenerateConsistencyTokenResponse> {
        Err(unimplemented("generate_consistency_token"))
    }

    /// Implements [crate::client::BigtableTableAdmin::check_consistency].
    async fn check_consistency(
        &self,
        _req: model::CheckConsistencyRequest,
        _options: RequestOptions,
    ) -> Result<model::CheckConsistencyResponse> {
        Err(unimplemented("check_consistency"))
    }
}

fn unimplemented(method: &str) -> Error {
    Error::service(
        Status::default()
            .set_code(Code::Unimplemented)
            .set_message(format!("{method} is not implemented by this stub")),
    )
}
