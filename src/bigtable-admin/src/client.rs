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

//! Contains the Bigtable table admin client and related types.

use crate::builder;
use crate::stub::TableAdmin;
use gax::backoff_policy::BackoffPolicyArg;
use gax::completion_queue::CompletionQueue;
use gax::options::ClientConfig;
use gax::polling_policy::PollingPolicyArg;
use gax::retry_policy::RetryPolicyArg;
use std::sync::Arc;

/// Implements a client for the Cloud Bigtable Admin API.
///
/// # Example
/// ```
/// # use gcloud_bigtable_admin::client::BigtableTableAdmin;
/// # use gcloud_bigtable_admin::stub::TableAdmin;
/// # #[derive(Debug)]
/// # struct MyStub;
/// # impl TableAdmin for MyStub {}
/// let client = BigtableTableAdmin::builder().build(MyStub);
/// // use `client` to make requests to the Cloud Bigtable Admin API.
/// ```
///
/// # Configuration
///
/// To configure `BigtableTableAdmin` use the `with_*` methods in the type
/// returned by [builder()][BigtableTableAdmin::builder]. The default
/// configuration should work for most applications. Common configuration
/// changes include
///
/// * [with_retry_policy()]: by default the client retries transient errors
///   of idempotent requests for up to 10 minutes.
/// * [with_polling_policy()]: by default polling loops, such as
///   [async_wait_for_consistency()][BigtableTableAdmin::async_wait_for_consistency],
///   compose the retry and backoff policies.
/// * [with_completion_queue()]: share a completion queue between clients.
///
/// # Pooling and Cloning
///
/// `BigtableTableAdmin` holds its configuration and stub in an [Arc], it is
/// cheap to clone. You do not need to wrap it in an [Rc](std::rc::Rc) or
/// [Arc] to reuse it.
///
/// # Service Description
///
/// The transport is provided by the [TableAdmin] stub. This client adds retry
/// loops, polling loops, and pagination on top of the stub.
///
/// [with_retry_policy()]: ClientBuilder::with_retry_policy
/// [with_polling_policy()]: ClientBuilder::with_polling_policy
/// [with_completion_queue()]: ClientBuilder::with_completion_queue
#[derive(Clone, Debug)]
pub struct BigtableTableAdmin {
    stub: Arc<dyn TableAdmin>,
    config: Arc<ClientConfig>,
}

impl BigtableTableAdmin {
    /// Returns a builder for [BigtableTableAdmin].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a new client from the provided stub, with the default
    /// configuration.
    ///
    /// The most common case for calling this function is in tests mocking the
    /// client's behavior.
    pub fn from_stub<T>(stub: T) -> Self
    where
        T: TableAdmin + 'static,
    {
        Self::builder().build(stub)
    }

    /// Lists all tables served from a specified instance.
    ///
    /// # Parameters
    /// * `parent` - the instance name. In
    ///   `projects/{project}/instances/{instance}` format.
    pub fn list_tables<T: Into<String>>(&self, parent: T) -> builder::ListTables {
        builder::ListTables::new(self.stub.clone(), self.config.clone()).set_parent(parent)
    }

    /// Generates a consistency token for a table.
    ///
    /// The token can be used in
    /// [check_consistency()][BigtableTableAdmin::check_consistency] or
    /// [async_wait_for_consistency()][BigtableTableAdmin::async_wait_for_consistency]
    /// to check whether mutations to the table that finished before this call
    /// started have been replicated.
    ///
    /// # Parameters
    /// * `name` - the table name. In
    ///   `projects/{project}/instances/{instance}/tables/{table}` format.
    pub fn generate_consistency_token<T: Into<String>>(
        &self,
        name: T,
    ) -> builder::GenerateConsistencyToken {
        builder::GenerateConsistencyToken::new(self.stub.clone(), self.config.clone())
            .set_name(name)
    }

    /// Checks replication consistency once, based on a consistency token.
    ///
    /// # Parameters
    /// * `name` - the table name. In
    ///   `projects/{project}/instances/{instance}/tables/{table}` format.
    /// * `consistency_token` - a token from
    ///   [generate_consistency_token()][BigtableTableAdmin::generate_consistency_token].
    pub fn check_consistency<N, T>(&self, name: N, consistency_token: T) -> builder::CheckConsistency
    where
        N: Into<String>,
        T: Into<String>,
    {
        builder::CheckConsistency::new(self.stub.clone(), self.config.clone())
            .set_name(name)
            .set_consistency_token(consistency_token)
    }

    /// Polls the table until it is consistent with `consistency_token`.
    ///
    /// The polling loop runs in the background, see
    /// [AsyncWaitForConsistency::start()][builder::AsyncWaitForConsistency::start].
    ///
    /// # Parameters
    /// * `name` - the table name. In
    ///   `projects/{project}/instances/{instance}/tables/{table}` format.
    /// * `consistency_token` - a token from
    ///   [generate_consistency_token()][BigtableTableAdmin::generate_consistency_token].
    pub fn async_wait_for_consistency<N, T>(
        &self,
        name: N,
        consistency_token: T,
    ) -> builder::AsyncWaitForConsistency
    where
        N: Into<String>,
        T: Into<String>,
    {
        builder::AsyncWaitForConsistency::new(self.stub.clone(), self.config.clone())
            .set_name(name)
            .set_consistency_token(consistency_token)
    }

    /// Generates a consistency token and waits until the table is consistent
    /// with it.
    ///
    /// # Parameters
    /// * `name` - the table name. In
    ///   `projects/{project}/instances/{instance}/tables/{table}` format.
    pub fn wait_for_consistency<T: Into<String>>(&self, name: T) -> builder::WaitForConsistency {
        builder::WaitForConsistency::new(self.stub.clone(), self.config.clone()).set_name(name)
    }
}

/// A builder for [BigtableTableAdmin].
///
/// ```
/// # use gcloud_bigtable_admin::client::BigtableTableAdmin;
/// # use gcloud_bigtable_admin::stub::TableAdmin;
/// # #[derive(Debug)]
/// # struct MyStub;
/// # impl TableAdmin for MyStub {}
/// use gax::retry_policy::{Aip194Strict, RetryPolicyExt};
/// let client = BigtableTableAdmin::builder()
///     .with_retry_policy(Aip194Strict.with_error_limit(5))
///     .build(MyStub);
/// ```
#[derive(Clone, Debug)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Creates a new client using `stub` as the transport.
    pub fn build<T>(self, stub: T) -> BigtableTableAdmin
    where
        T: TableAdmin + 'static,
    {
        BigtableTableAdmin {
            stub: Arc::new(stub),
            config: Arc::new(self.config),
        }
    }

    /// Configure the retry policy.
    ///
    /// The client libraries can automatically retry operations that fail. The
    /// retry policy controls what errors are considered retryable, sets limits
    /// on the number of attempts or the time trying to make attempts.
    pub fn with_retry_policy<V: Into<RetryPolicyArg>>(mut self, v: V) -> Self {
        self.config = self.config.set_retry_policy(v);
        self
    }

    /// Configure the retry backoff policy.
    ///
    /// The backoff policy controls how long to wait in between retry attempts.
    pub fn with_backoff_policy<V: Into<BackoffPolicyArg>>(mut self, v: V) -> Self {
        self.config = self.config.set_backoff_policy(v);
        self
    }

    /// Configure the polling policy.
    ///
    /// The polling policy controls how polling loops handle errors, how long
    /// they run, and how long they wait between attempts.
    pub fn with_polling_policy<V: Into<PollingPolicyArg>>(mut self, v: V) -> Self {
        self.config = self.config.set_polling_policy(v);
        self
    }

    /// Configure the completion queue for requests and timers.
    pub fn with_completion_queue(mut self, v: CompletionQueue) -> Self {
        self.config = self.config.set_completion_queue(v);
        self
    }
}
