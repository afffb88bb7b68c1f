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

//! Request builders for [BigtableTableAdmin][crate::client::BigtableTableAdmin].
//!
//! Each client method returns one of these builders. Use the `set_*` methods
//! to set the request fields, the [RequestOptionsBuilder] methods to override
//! the client configuration for this request, and then `send()` the request.
//!
//! [RequestOptionsBuilder]: gax::options::RequestOptionsBuilder

use crate::model;
use crate::stub::TableAdmin;
use gax::Result;
use gax::error::Error;
use gax::options::{ClientConfig, RequestOptions};
use gax::retry_loop::retry_loop;
use gax::stream_range::StreamRange;
use lro::{PollingHandle, PollingResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
pub(crate) struct RequestBuilder<R: std::default::Default> {
    stub: Arc<dyn TableAdmin>,
    config: Arc<ClientConfig>,
    request: R,
    options: RequestOptions,
}

impl<R> RequestBuilder<R>
where
    R: std::default::Default,
{
    pub(crate) fn new(stub: Arc<dyn TableAdmin>, config: Arc<ClientConfig>) -> Self {
        Self {
            stub,
            config,
            request: R::default(),
            options: RequestOptions::default(),
        }
    }

    fn with_request(self, request: R) -> Self {
        Self { request, ..self }
    }
}

/// The request builder for [BigtableTableAdmin::list_tables][crate::client::BigtableTableAdmin::list_tables] calls.
///
/// # Example
/// ```no_run
/// # use gcloud_bigtable_admin::client::BigtableTableAdmin;
/// async fn example(client: &BigtableTableAdmin) -> gax::Result<()> {
///     let mut tables = client
///         .list_tables("projects/my-project/instances/my-instance")
///         .by_item();
///     while let Some(table) = tables.next().await {
///         println!("{:?}", table?);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct ListTables(RequestBuilder<model::ListTablesRequest>);

impl ListTables {
    pub(crate) fn new(stub: Arc<dyn TableAdmin>, config: Arc<ClientConfig>) -> Self {
        Self(RequestBuilder::new(stub, config))
    }

    /// Sets the full request, replacing any prior values.
    pub fn with_request<V: Into<model::ListTablesRequest>>(mut self, v: V) -> Self {
        self.0 = self.0.with_request(v.into());
        self
    }

    /// Sends the request, returning a single page of results.
    pub async fn send(self) -> Result<model::ListTablesResponse> {
        let RequestBuilder {
            stub,
            config,
            request,
            options,
        } = self.0;
        let options = options.set_default_idempotency(true);
        let inner = {
            let options = options.clone();
            move |remaining| {
                let stub = stub.clone();
                let request = request.clone();
                let options = options.clone();
                async move { attempt(remaining, stub.list_tables(request, options)).await }
            }
        };
        retry(&config, &options, inner).await
    }

    /// Streams each item in the collection.
    ///
    /// Each page is fetched with its own retry loop. The stream ends after the
    /// last page, or after the first page that fails.
    pub fn by_item(self) -> StreamRange<model::Table> {
        let seed = self.0.request.page_token.clone();
        StreamRange::new(seed, move |token| self.clone().set_page_token(token).send())
    }

    /// Sets the value of [parent][model::ListTablesRequest::parent].
    pub fn set_parent<T: Into<String>>(mut self, v: T) -> Self {
        self.0.request.parent = v.into();
        self
    }

    /// Sets the value of [page_size][model::ListTablesRequest::page_size].
    pub fn set_page_size<T: Into<i32>>(mut self, v: T) -> Self {
        self.0.request.page_size = v.into();
        self
    }

    /// Sets the value of [page_token][model::ListTablesRequest::page_token].
    pub fn set_page_token<T: Into<String>>(mut self, v: T) -> Self {
        self.0.request.page_token = v.into();
        self
    }
}

impl gax::options::internal::RequestBuilder for ListTables {
    fn request_options(&mut self) -> &mut RequestOptions {
        &mut self.0.options
    }
}

/// The request builder for [BigtableTableAdmin::generate_consistency_token][crate::client::BigtableTableAdmin::generate_consistency_token] calls.
///
/// # Example
/// ```no_run
/// # use gcloud_bigtable_admin::client::BigtableTableAdmin;
/// async fn example(client: &BigtableTableAdmin) -> gax::Result<()> {
///     let response = client
///         .generate_consistency_token("projects/my-project/instances/my-instance/tables/my-table")
///         .send()
///         .await?;
///     println!("token={}", response.consistency_token);
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct GenerateConsistencyToken(RequestBuilder<model::GenerateConsistencyTokenRequest>);

impl GenerateConsistencyToken {
    pub(crate) fn new(stub: Arc<dyn TableAdmin>, config: Arc<ClientConfig>) -> Self {
        Self(RequestBuilder::new(stub, config))
    }

    /// Sets the full request, replacing any prior values.
    pub fn with_request<V: Into<model::GenerateConsistencyTokenRequest>>(mut self, v: V) -> Self {
        self.0 = self.0.with_request(v.into());
        self
    }

    /// Sends the request.
    pub async fn send(self) -> Result<model::GenerateConsistencyTokenResponse> {
        let RequestBuilder {
            stub,
            config,
            request,
            options,
        } = self.0;
        let options = options.set_default_idempotency(true);
        let inner = {
            let options = options.clone();
            move |remaining| {
                let stub = stub.clone();
                let request = request.clone();
                let options = options.clone();
                async move { attempt(remaining, stub.generate_consistency_token(request, options)).await }
            }
        };
        retry(&config, &options, inner).await
    }

    /// Sets the value of [name][model::GenerateConsistencyTokenRequest::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.0.request.name = v.into();
        self
    }
}

impl gax::options::internal::RequestBuilder for GenerateConsistencyToken {
    fn request_options(&mut self) -> &mut RequestOptions {
        &mut self.0.options
    }
}

/// The request builder for [BigtableTableAdmin::check_consistency][crate::client::BigtableTableAdmin::check_consistency] calls.
///
/// This checks the consistency once. Use
/// [async_wait_for_consistency][crate::client::BigtableTableAdmin::async_wait_for_consistency]
/// to poll until the table is consistent.
#[derive(Clone, Debug)]
pub struct CheckConsistency(RequestBuilder<model::CheckConsistencyRequest>);

impl CheckConsistency {
    pub(crate) fn new(stub: Arc<dyn TableAdmin>, config: Arc<ClientConfig>) -> Self {
        Self(RequestBuilder::new(stub, config))
    }

    /// Sets the full request, replacing any prior values.
    pub fn with_request<V: Into<model::CheckConsistencyRequest>>(mut self, v: V) -> Self {
        self.0 = self.0.with_request(v.into());
        self
    }

    /// Sends the request.
    pub async fn send(self) -> Result<model::CheckConsistencyResponse> {
        let RequestBuilder {
            stub,
            config,
            request,
            options,
        } = self.0;
        let options = options.set_default_idempotency(true);
        let inner = {
            let options = options.clone();
            move |remaining| {
                let stub = stub.clone();
                let request = request.clone();
                let options = options.clone();
                async move { attempt(remaining, stub.check_consistency(request, options)).await }
            }
        };
        retry(&config, &options, inner).await
    }

    /// Sets the value of [name][model::CheckConsistencyRequest::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.0.request.name = v.into();
        self
    }

    /// Sets the value of [consistency_token][model::CheckConsistencyRequest::consistency_token].
    pub fn set_consistency_token<T: Into<String>>(mut self, v: T) -> Self {
        self.0.request.consistency_token = v.into();
        self
    }
}

impl gax::options::internal::RequestBuilder for CheckConsistency {
    fn request_options(&mut self) -> &mut RequestOptions {
        &mut self.0.options
    }
}

/// The request builder for [BigtableTableAdmin::async_wait_for_consistency][crate::client::BigtableTableAdmin::async_wait_for_consistency] calls.
///
/// The polling loop checks the consistency of the table until the service
/// reports the table is consistent, the polling policy is exhausted, or the
/// loop is cancelled. Configure the loop with
/// [with_polling_policy()][gax::options::RequestOptionsBuilder::with_polling_policy].
///
/// # Example
/// ```no_run
/// # use gcloud_bigtable_admin::client::BigtableTableAdmin;
/// async fn example(client: &BigtableTableAdmin, token: String) -> gax::Result<()> {
///     let handle = client
///         .async_wait_for_consistency("projects/my-project/instances/my-instance/tables/my-table", token)
///         .start();
///     // ... do some other work, and maybe call `handle.cancel()` ...
///     handle.await?;
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct AsyncWaitForConsistency(RequestBuilder<model::CheckConsistencyRequest>);

impl AsyncWaitForConsistency {
    pub(crate) fn new(stub: Arc<dyn TableAdmin>, config: Arc<ClientConfig>) -> Self {
        Self(RequestBuilder::new(stub, config))
    }

    /// Sets the full request, replacing any prior values.
    pub fn with_request<V: Into<model::CheckConsistencyRequest>>(mut self, v: V) -> Self {
        self.0 = self.0.with_request(v.into());
        self
    }

    /// Starts the polling loop in the background.
    ///
    /// The loop runs its attempts and timers on the client's completion
    /// queue. The returned handle resolves when the table is consistent, or
    /// with the error that stopped the loop.
    ///
    /// # Panics
    /// If called outside the context of a tokio runtime.
    pub fn start(self) -> PollingHandle<()> {
        let RequestBuilder {
            stub,
            config,
            request,
            options,
        } = self.0;
        let policy = options.polling_policy(&config);
        let operation = format!("the consistency check for {}", request.name);
        tracing::debug!(table = %request.name, "starting wait for consistency");
        let query = move |remaining| {
            let stub = stub.clone();
            let request = request.clone();
            let options = options.clone();
            async move {
                let response =
                    attempt(remaining, stub.check_consistency(request, options)).await?;
                if response.consistent {
                    return Ok(PollingResult::Completed(()));
                }
                Ok(PollingResult::InProgress)
            }
        };
        lro::async_poll(config.completion_queue(), policy, operation, query)
    }

    /// Starts the polling loop and waits until it resolves.
    pub async fn send(self) -> Result<()> {
        self.start().await
    }

    /// Sets the value of [name][model::CheckConsistencyRequest::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.0.request.name = v.into();
        self
    }

    /// Sets the value of [consistency_token][model::CheckConsistencyRequest::consistency_token].
    pub fn set_consistency_token<T: Into<String>>(mut self, v: T) -> Self {
        self.0.request.consistency_token = v.into();
        self
    }
}

impl gax::options::internal::RequestBuilder for AsyncWaitForConsistency {
    fn request_options(&mut self) -> &mut RequestOptions {
        &mut self.0.options
    }
}

/// The request builder for [BigtableTableAdmin::wait_for_consistency][crate::client::BigtableTableAdmin::wait_for_consistency] calls.
///
/// Generates a consistency token for the table, and then polls until the
/// table is consistent with that token.
#[derive(Clone, Debug)]
pub struct WaitForConsistency(RequestBuilder<model::GenerateConsistencyTokenRequest>);

impl WaitForConsistency {
    pub(crate) fn new(stub: Arc<dyn TableAdmin>, config: Arc<ClientConfig>) -> Self {
        Self(RequestBuilder::new(stub, config))
    }

    /// Sends the requests.
    ///
    /// The request options apply to both the token generation and the polling
    /// loop.
    pub async fn send(self) -> Result<()> {
        let RequestBuilder {
            stub,
            config,
            request,
            options,
        } = self.0;
        let name = request.name.clone();
        let token = GenerateConsistencyToken(RequestBuilder {
            stub: stub.clone(),
            config: config.clone(),
            request,
            options: options.clone(),
        })
        .send()
        .await?;
        AsyncWaitForConsistency(RequestBuilder {
            stub,
            config,
            request: model::CheckConsistencyRequest::new()
                .set_name(name)
                .set_consistency_token(token.consistency_token),
            options,
        })
        .send()
        .await
    }

    /// Sets the value of [name][model::GenerateConsistencyTokenRequest::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.0.request.name = v.into();
        self
    }
}

impl gax::options::internal::RequestBuilder for WaitForConsistency {
    fn request_options(&mut self) -> &mut RequestOptions {
        &mut self.0.options
    }
}

// Runs `inner` in a retry loop, using the completion queue for the backoff
// timers. The loop stops if a timer is cancelled.
fn retry<Response, F, Fut>(
    config: &ClientConfig,
    options: &RequestOptions,
    inner: F,
) -> std::pin::Pin<Box<dyn Future<Output = Result<Response>> + Send>>
where
    F: FnMut(Option<Duration>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
    Response: Send + 'static,
{
    let cq = config.completion_queue().clone();
    let sleep = move |d| {
        let timer = cq.make_relative_timer(d);
        async move { timer.await.map(|_| ()) }
    };
    let mut inner = inner;
    Box::pin(retry_loop(
        move |d| inner(d),
        sleep,
        options.idempotent().unwrap_or(false),
        options.retry_policy(config),
        options.backoff_policy(config),
    ))
}

// Limits a single attempt to the time remaining in the retry loop.
async fn attempt<T, F>(remaining: Option<Duration>, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match remaining {
        None => call.await,
        Some(d) => tokio::time::timeout(d, call)
            .await
            .map_err(Error::timeout)?,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gax::error::rpc::Code;

    #[derive(Debug)]
    struct Unimplemented;
    impl TableAdmin for Unimplemented {}

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn futures_are_send() {
        let stub: Arc<dyn TableAdmin> = Arc::new(Unimplemented);
        let config = Arc::new(ClientConfig::default());
        let list = ListTables::new(stub.clone(), config.clone()).send();
        assert_send(&list);
        let token = GenerateConsistencyToken::new(stub.clone(), config.clone()).send();
        assert_send(&token);
        let check = CheckConsistency::new(stub.clone(), config.clone()).send();
        assert_send(&check);
        let wait = WaitForConsistency::new(stub.clone(), config.clone()).send();
        assert_send(&wait);
        let items = ListTables::new(stub, config).by_item();
        assert_send(&items);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_timeout() {
        let call = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        };
        let err = attempt(Some(Duration::from_secs(1)), call).await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(err.code(), Code::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_without_limit() -> anyhow::Result<()> {
        let call = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(42)
        };
        assert_eq!(attempt(None, call).await?, 42);
        Ok(())
    }
}
