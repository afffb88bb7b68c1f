// Copyright 2024 Google LLC
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

//! Client configuration and per request options.
//!
//! While the client library defaults are intended to work for most
//! applications, it is sometimes necessary to change the configuration.
//! Applications may need a longer retry loop, a different backoff, or a
//! polling loop that gives up sooner.
//!
//! [ClientConfig] holds the defaults for all requests made by a client. The
//! `*Builder` returned by each client method implements the
//! [RequestOptionsBuilder] trait where applications can override these
//! defaults for a single request.
//!
//! The policies in both types are prototypes. Each request gets fresh
//! instances, so no two requests share the state of a policy.

use crate::backoff_policy::{BackoffPolicy, BackoffPolicyArg};
use crate::completion_queue::CompletionQueue;
use crate::exponential_backoff::ExponentialBackoff;
use crate::polling_policy::{GenericPollingPolicy, PollingPolicy, PollingPolicyArg};
use crate::retry_policy::{Aip194Strict, RetryPolicy, RetryPolicyArg, RetryPolicyExt};
use std::sync::Arc;
use std::time::Duration;

/// The default limit for retry and polling loops.
const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(10 * 60);

/// A set of options configuring a single request.
///
/// Application only use this class directly in mocks, where they may want to
/// verify their application has configured all the right request parameters and
/// options.
///
/// All other code uses this type indirectly, via the per-request builders.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    idempotent: Option<bool>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    backoff_policy: Option<Arc<dyn BackoffPolicy>>,
    polling_policy: Option<Arc<dyn PollingPolicy>>,
}

impl RequestOptions {
    /// Treat the RPC underlying RPC in this method as idempotent.
    ///
    /// If a retry policy is configured, the policy may examine the idempotency
    /// and the error details to decide if the error is retryable. Typically
    /// [idempotent] RPCs are safe to retry under more error conditions
    /// than non-idempotent RPCs.
    ///
    /// [idempotent]: https://en.wikipedia.org/wiki/Idempotence
    pub fn set_idempotency(&mut self, value: bool) {
        self.idempotent = Some(value);
    }

    /// Set the idempotency for the underlying RPC unless it is already set.
    ///
    /// If [set_idempotency][Self::set_idempotency] was already called this
    /// method has no effect. Otherwise it sets the idempotency. The client
    /// libraries use this to provide a default idempotency value.
    pub fn set_default_idempotency(mut self, default: bool) -> Self {
        self.idempotent.get_or_insert(default);
        self
    }

    /// Gets the idempotency, if set.
    pub fn idempotent(&self) -> Option<bool> {
        self.idempotent
    }

    /// Sets the retry policy configuration.
    pub fn set_retry_policy<V: Into<RetryPolicyArg>>(&mut self, v: V) {
        self.retry_policy = Some(v.into().0);
    }

    /// Sets the backoff policy configuration.
    pub fn set_backoff_policy<V: Into<BackoffPolicyArg>>(&mut self, v: V) {
        self.backoff_policy = Some(v.into().0);
    }

    /// Sets the polling policy configuration.
    pub fn set_polling_policy<V: Into<PollingPolicyArg>>(&mut self, v: V) {
        self.polling_policy = Some(v.into().0);
    }

    /// A fresh retry policy for this request.
    ///
    /// Uses the request override, if any, or the client default.
    pub fn retry_policy(&self, config: &ClientConfig) -> Box<dyn RetryPolicy> {
        self.retry_policy
            .as_ref()
            .unwrap_or(&config.retry_policy)
            .clone_policy()
    }

    /// A fresh backoff policy for this request.
    ///
    /// Uses the request override, if any, or the client default.
    pub fn backoff_policy(&self, config: &ClientConfig) -> Box<dyn BackoffPolicy> {
        self.backoff_policy
            .as_ref()
            .unwrap_or(&config.backoff_policy)
            .clone_policy()
    }

    /// A fresh polling policy for this request.
    ///
    /// An explicit polling policy, in the request or the client configuration,
    /// takes precedence. Otherwise the polling policy is composed from the
    /// effective retry and backoff policies.
    pub fn polling_policy(&self, config: &ClientConfig) -> Box<dyn PollingPolicy> {
        if let Some(p) = self.polling_policy.as_ref() {
            return p.clone_policy();
        }
        if self.retry_policy.is_none() && self.backoff_policy.is_none() {
            if let Some(p) = config.polling_policy.as_ref() {
                return p.clone_policy();
            }
        }
        Box::new(GenericPollingPolicy::from_prototypes(
            self.retry_policy
                .as_deref()
                .unwrap_or(config.retry_policy.as_ref()),
            self.backoff_policy
                .as_deref()
                .unwrap_or(config.backoff_policy.as_ref()),
        ))
    }
}

/// Implementations of this trait provide setters to configure request options.
///
/// The client libraries provide a builder for each RPC. These builders can be
/// used to set the request parameters, e.g., the name of the resource targeted
/// by the RPC, as well as any options affecting the request, such as the retry
/// policy.
pub trait RequestOptionsBuilder {
    /// If `v` is `true`, treat the RPC underlying this method as idempotent.
    fn with_idempotency(self, v: bool) -> Self;

    /// Sets the retry policy configuration.
    fn with_retry_policy<V: Into<RetryPolicyArg>>(self, v: V) -> Self;

    /// Sets the backoff policy configuration.
    fn with_backoff_policy<V: Into<BackoffPolicyArg>>(self, v: V) -> Self;

    /// Sets the polling policy configuration.
    fn with_polling_policy<V: Into<PollingPolicyArg>>(self, v: V) -> Self;
}

/// Simplify implementation of the [RequestOptionsBuilder] trait in generated
/// code.
///
/// This is an implementation detail, most applications have little need to
/// worry about or use this trait.
pub mod internal {
    use super::RequestOptions;

    pub trait RequestBuilder {
        fn request_options(&mut self) -> &mut RequestOptions;
    }
}

impl<T> RequestOptionsBuilder for T
where
    T: internal::RequestBuilder,
{
    fn with_idempotency(mut self, v: bool) -> Self {
        self.request_options().set_idempotency(v);
        self
    }

    fn with_retry_policy<V: Into<RetryPolicyArg>>(mut self, v: V) -> Self {
        self.request_options().set_retry_policy(v);
        self
    }

    fn with_backoff_policy<V: Into<BackoffPolicyArg>>(mut self, v: V) -> Self {
        self.request_options().set_backoff_policy(v);
        self
    }

    fn with_polling_policy<V: Into<PollingPolicyArg>>(mut self, v: V) -> Self {
        self.request_options().set_polling_policy(v);
        self
    }
}

/// Configure a client.
///
/// A client represents a connection to a Google Cloud Service. Each service
/// has one or more client types. The default configuration for each client
/// should work for most applications. But some applications may need to
/// override the default retry, backoff, or polling policies, or share a
/// [CompletionQueue] between clients.
///
/// # Example
/// ```
/// # use gcloud_gax::options::ClientConfig;
/// # use gcloud_gax::retry_policy::*;
/// let config = ClientConfig::new()
///     .set_retry_policy(Aip194Strict.with_error_limit(3));
/// ```
#[derive(Clone, Debug)]
pub struct ClientConfig {
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
    polling_policy: Option<Arc<dyn PollingPolicy>>,
    completion_queue: CompletionQueue,
}

impl ClientConfig {
    /// Returns a default [ClientConfig].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default retry policy for all requests.
    pub fn set_retry_policy<V: Into<RetryPolicyArg>>(mut self, v: V) -> Self {
        self.retry_policy = v.into().0;
        self
    }

    /// Sets the default backoff policy for all requests.
    pub fn set_backoff_policy<V: Into<BackoffPolicyArg>>(mut self, v: V) -> Self {
        self.backoff_policy = v.into().0;
        self
    }

    /// Sets the default polling policy for all polling loops.
    ///
    /// If not set, polling loops compose the retry and backoff policies.
    pub fn set_polling_policy<V: Into<PollingPolicyArg>>(mut self, v: V) -> Self {
        self.polling_policy = Some(v.into().0);
        self
    }

    /// Sets the completion queue used to run requests and timers.
    pub fn set_completion_queue(mut self, v: CompletionQueue) -> Self {
        self.completion_queue = v;
        self
    }

    /// The completion queue used to run requests and timers.
    pub fn completion_queue(&self) -> &CompletionQueue {
        &self.completion_queue
    }
}

impl std::default::Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry_policy: Arc::new(Aip194Strict.with_time_limit(DEFAULT_TIME_LIMIT)),
            backoff_policy: Arc::new(ExponentialBackoff::default()),
            polling_policy: None,
            completion_queue: CompletionQueue::new(),
        }
    }
}
