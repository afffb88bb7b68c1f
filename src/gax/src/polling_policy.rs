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

//! Defines the types for polling policies.
//!
//! The client libraries poll long-running operations (LROs) and other "wait
//! until some condition holds" requests. The polling loop needs to (1)
//! distinguish between transient and permanent errors, (2) limit the
//! polling loop duration, and (3) decide how long to wait between attempts.
//!
//! A [PollingPolicy] answers all these questions. The [GenericPollingPolicy]
//! composes a [RetryPolicy] for (1) and (2), and a [BackoffPolicy] for (3).
//!
//! # Example
//! ```
//! # use gcloud_gax::polling_policy::*;
//! # use gcloud_gax::retry_policy::*;
//! # use gcloud_gax::exponential_backoff::ExponentialBackoff;
//! use std::time::Duration;
//! // Poll for at most 15 minutes, and tolerate at most 5 transient errors.
//! let policy = GenericPollingPolicy::new(
//!     Aip194Strict
//!         .with_time_limit(Duration::from_secs(15 * 60))
//!         .with_error_limit(5),
//!     ExponentialBackoff::default(),
//! );
//! ```

use crate::backoff_policy::BackoffPolicy;
use crate::error::Error;
use crate::retry_policy::RetryPolicy;
use crate::retry_result::RetryResult;
use std::sync::Arc;
use std::time::Duration;

/// Determines how the polling loop handles errors, and how long it waits
/// between attempts.
///
/// Polling policies are stateful. Each polling loop gets its own instance via
/// [clone_policy()][PollingPolicy::clone_policy].
pub trait PollingPolicy: Send + Sync + std::fmt::Debug {
    /// Returns true if retrying the request cannot fix `error`.
    fn is_permanent_error(&self, error: &Error) -> bool;

    /// Query the polling policy after an error.
    ///
    /// Returns [RetryResult::Continue] if the loop should wait and try again.
    fn on_failure(&mut self, error: Error) -> RetryResult;

    /// Called when the request succeeds, but the awaited condition does not
    /// hold yet.
    ///
    /// Returns an error if the loop should stop.
    fn on_in_progress(&mut self, _operation: &str) -> Option<Error> {
        None
    }

    /// The delay before the next attempt.
    fn wait_period(&mut self) -> Duration;

    /// The time left for the polling loop, if the policy has a time limit.
    ///
    /// The loop uses this value to limit each attempt.
    fn remaining_time(&self) -> Option<Duration> {
        None
    }

    /// Returns a new policy with the same configuration and a fresh state.
    fn clone_policy(&self) -> Box<dyn PollingPolicy>;
}

/// A helper type to use [PollingPolicy] in client and request options.
#[derive(Clone, Debug)]
pub struct PollingPolicyArg(pub(crate) Arc<dyn PollingPolicy>);

impl<T: PollingPolicy + 'static> std::convert::From<T> for PollingPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn PollingPolicy>> for PollingPolicyArg {
    fn from(value: Arc<dyn PollingPolicy>) -> Self {
        Self(value)
    }
}

impl std::convert::From<PollingPolicyArg> for Arc<dyn PollingPolicy> {
    fn from(value: PollingPolicyArg) -> Self {
        value.0
    }
}

/// A polling policy composed of a retry policy and a backoff policy.
///
/// Errors are classified and counted by the retry policy. The delay between
/// attempts, after errors and after "still in progress" responses, comes from
/// the backoff policy.
///
/// Responses reporting that the operation is still in progress do not consume
/// the error budget of the retry policy. They only stop the loop once the
/// retry policy has no time left, see [RetryPolicy::remaining_time].
#[derive(Debug)]
pub struct GenericPollingPolicy {
    retry: Box<dyn RetryPolicy>,
    backoff: Box<dyn BackoffPolicy>,
}

impl GenericPollingPolicy {
    /// Creates a new instance, taking ownership of the two policies.
    pub fn new<R, B>(retry: R, backoff: B) -> Self
    where
        R: RetryPolicy + 'static,
        B: BackoffPolicy + 'static,
    {
        Self {
            retry: Box::new(retry),
            backoff: Box::new(backoff),
        }
    }

    /// Creates a new instance with fresh clones of the two prototypes.
    pub fn from_prototypes(retry: &dyn RetryPolicy, backoff: &dyn BackoffPolicy) -> Self {
        Self {
            retry: retry.clone_policy(),
            backoff: backoff.clone_policy(),
        }
    }
}

impl PollingPolicy for GenericPollingPolicy {
    fn is_permanent_error(&self, error: &Error) -> bool {
        // Polling requests only read the state of the operation.
        self.retry.is_permanent(true, error)
    }

    fn on_failure(&mut self, error: Error) -> RetryResult {
        if self.is_permanent_error(&error) {
            return RetryResult::Permanent(error);
        }
        self.retry.on_error(true, error)
    }

    fn on_in_progress(&mut self, operation: &str) -> Option<Error> {
        if self.retry.remaining_time() != Some(Duration::ZERO) {
            return None;
        }
        Some(Error::exhausted(format!(
            "terminated because of policy: the time limit was reached while {operation} was still in progress"
        )))
    }

    fn wait_period(&mut self) -> Duration {
        self.backoff.on_completion()
    }

    fn remaining_time(&self) -> Option<Duration> {
        self.retry.remaining_time()
    }

    fn clone_policy(&self) -> Box<dyn PollingPolicy> {
        Box::new(Self::from_prototypes(
            self.retry.as_ref(),
            self.backoff.as_ref(),
        ))
    }
}
