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

//! Defines traits for retry policies and some common implementations.
//!
//! The client libraries automatically retry RPCs when they fail due to
//! transient errors and the RPC is idempotent, that is, it is safe to perform
//! the RPC more than once.
//!
//! Retry policies are stateful: they count errors, or track the time since the
//! loop started. Client configuration holds a *prototype* of the policy, and
//! each retry loop calls [clone_policy()][RetryPolicy::clone_policy] to get a
//! fresh instance. Concurrent operations never share a policy instance.
//!
//! # Example
//! ```
//! # use gcloud_gax::retry_policy::*;
//! use std::time::Duration;
//! // Retry for at most 10 seconds, and tolerate at most 5 transient errors:
//! // whichever limit is reached first stops the retry loop.
//! let policy = Aip194Strict
//!     .with_time_limit(Duration::from_secs(10))
//!     .with_error_limit(5);
//! ```

use crate::error::rpc::Code;
use crate::error::{Error, Exhausted};
use crate::retry_result::RetryResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Determines how errors are handled in the retry loop.
///
/// Implementations of this trait classify errors as transient or permanent,
/// and keep track of the budget consumed by the loop.
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// Query the retry policy after an error.
    ///
    /// Only errors classified as transient consume the budget of the policy.
    /// Permanent errors are returned as [RetryResult::Permanent] regardless
    /// of the remaining budget.
    ///
    /// # Parameters
    /// * `idempotent` - if `true` assume the operation is idempotent. Many more
    ///   errors are retryable on idempotent operations.
    /// * `error` - the last error received from a request.
    fn on_error(&mut self, idempotent: bool, error: Error) -> RetryResult {
        if self.is_permanent(idempotent, &error) {
            return RetryResult::Permanent(error);
        }
        RetryResult::Continue(error)
    }

    /// Returns true if retrying the request cannot fix `error`.
    ///
    /// This does not change the state of the policy.
    fn is_permanent(&self, idempotent: bool, error: &Error) -> bool;

    /// Returns true if the policy budget is spent.
    fn is_exhausted(&self) -> bool {
        false
    }

    /// The remaining time in the retry policy.
    ///
    /// For policies based on time, this returns the remaining time in the
    /// policy. For policies that are not time based this returns `None`.
    fn remaining_time(&self) -> Option<Duration> {
        None
    }

    /// Returns a new policy with the same configuration and a full budget.
    fn clone_policy(&self) -> Box<dyn RetryPolicy>;
}

/// A helper type to use [RetryPolicy] in client and request options.
#[derive(Clone, Debug)]
pub struct RetryPolicyArg(pub(crate) Arc<dyn RetryPolicy>);

impl<T: RetryPolicy + 'static> std::convert::From<T> for RetryPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn RetryPolicy>> for RetryPolicyArg {
    fn from(value: Arc<dyn RetryPolicy>) -> Self {
        Self(value)
    }
}

impl std::convert::From<RetryPolicyArg> for Arc<dyn RetryPolicy> {
    fn from(value: RetryPolicyArg) -> Self {
        value.0
    }
}

/// Extension trait for [RetryPolicy]
pub trait RetryPolicyExt: RetryPolicy + Sized + 'static {
    /// Decorate a [RetryPolicy] to limit the total elapsed time in the retry
    /// loop.
    ///
    /// # Example
    /// ```
    /// # use gcloud_gax::retry_policy::*;
    /// use std::time::Duration;
    /// let policy = Aip194Strict.with_time_limit(Duration::from_secs(10));
    /// assert!(policy.remaining_time() <= Some(Duration::from_secs(10)));
    /// ```
    fn with_time_limit(self, maximum_duration: Duration) -> LimitedElapsedTime {
        LimitedElapsedTime::custom(self, maximum_duration)
    }

    /// Decorate a [RetryPolicy] to limit the number of transient errors.
    ///
    /// # Example
    /// ```
    /// # use gcloud_gax::retry_policy::*;
    /// # use gcloud_gax::error::{Error, rpc::Code, rpc::Status};
    /// let mut policy = Aip194Strict.with_error_limit(1);
    /// assert!(policy.on_error(true, transient_error()).is_continue());
    /// assert!(policy.on_error(true, transient_error()).is_exhausted());
    ///
    /// fn transient_error() -> Error { Error::service(Status::default().set_code(Code::Unavailable)) }
    /// ```
    fn with_error_limit(self, maximum_error_count: u32) -> LimitedErrorCount {
        LimitedErrorCount::custom(self, maximum_error_count)
    }
}

impl<T: RetryPolicy + 'static> RetryPolicyExt for T {}

/// A retry policy that strictly follows [AIP-194].
///
/// This policy should be decorated to limit the number of retry attempts or the
/// duration of the retry loop.
///
/// The policy interprets AIP-194 **strictly**, the retry decision for
/// server-side errors are based only on the status code, and the only retryable
/// status code is [Code::Unavailable].
///
/// [AIP-194]: https://google.aip.dev/194
#[derive(Clone, Debug)]
pub struct Aip194Strict;

impl RetryPolicy for Aip194Strict {
    fn is_permanent(&self, idempotent: bool, error: &Error) -> bool {
        if error.is_cancelled() || error.is_exhausted() {
            return true;
        }
        if error.is_io() || error.is_timeout() {
            return !idempotent;
        }
        match error.status() {
            Some(s) if s.code == Code::Unavailable => !idempotent,
            _ => true,
        }
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(self.clone())
    }
}

/// A retry policy that treats a configurable set of status codes as transient.
///
/// The default set is [Code::Unavailable] and [Code::ResourceExhausted].
///
/// # Example
/// ```
/// # use gcloud_gax::retry_policy::*;
/// # use gcloud_gax::error::{Error, rpc::Code, rpc::Status};
/// let policy = TransientCodes::new([Code::Unavailable, Code::Aborted]);
/// assert!(!policy.is_permanent(true, &error(Code::Aborted)));
/// assert!(policy.is_permanent(true, &error(Code::PermissionDenied)));
///
/// fn error(code: Code) -> Error { Error::service(Status::default().set_code(code)) }
/// ```
#[derive(Clone, Debug)]
pub struct TransientCodes {
    codes: Vec<Code>,
}

impl TransientCodes {
    /// Creates a policy where only the given codes are transient.
    pub fn new<I: IntoIterator<Item = Code>>(codes: I) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }
}

impl Default for TransientCodes {
    fn default() -> Self {
        Self::new([Code::Unavailable, Code::ResourceExhausted])
    }
}

impl RetryPolicy for TransientCodes {
    fn is_permanent(&self, idempotent: bool, error: &Error) -> bool {
        if error.is_cancelled() || error.is_exhausted() {
            return true;
        }
        if error.is_io() || error.is_timeout() {
            return !idempotent;
        }
        match error.status() {
            Some(s) if self.codes.contains(&s.code) => !idempotent,
            _ => true,
        }
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(self.clone())
    }
}

/// A retry policy that retries every error, except cancellations.
///
/// This policy must be decorated to limit the number of retry attempts or the
/// duration of the retry loop.
#[derive(Clone, Debug)]
pub struct AlwaysRetry;

impl RetryPolicy for AlwaysRetry {
    fn is_permanent(&self, _idempotent: bool, error: &Error) -> bool {
        error.is_cancelled() || error.is_exhausted()
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(self.clone())
    }
}

/// A retry policy decorator that limits the total time in the retry loop.
///
/// This policy decorates an inner policy and limits the duration of retry
/// loops. The clock starts when the policy is created, or when a new instance
/// is created via [clone_policy()][RetryPolicy::clone_policy]. Once the
/// deadline is reached any transient error stops the loop with an
/// [Exhausted] error.
#[derive(Debug)]
pub struct LimitedElapsedTime {
    inner: Box<dyn RetryPolicy>,
    maximum_duration: Duration,
    start: Instant,
}

impl LimitedElapsedTime {
    /// Creates a new instance, with the [Aip194Strict] inner policy.
    pub fn new(maximum_duration: Duration) -> Self {
        Self::custom(Aip194Strict, maximum_duration)
    }

    /// Creates a new instance with a custom inner policy.
    pub fn custom<P: RetryPolicy + 'static>(inner: P, maximum_duration: Duration) -> Self {
        Self {
            inner: Box::new(inner),
            maximum_duration,
            start: Instant::now(),
        }
    }

    fn deadline(&self) -> Instant {
        self.start + self.maximum_duration
    }

    fn on_error_now(&mut self, now: Instant, idempotent: bool, error: Error) -> RetryResult {
        match self.inner.on_error(idempotent, error) {
            RetryResult::Continue(e) if now >= self.deadline() => {
                let elapsed = now.saturating_duration_since(self.start);
                RetryResult::Exhausted(Error::exhausted(
                    Exhausted::new(
                        "elapsed time",
                        format!("{elapsed:?}"),
                        format!("{:?}", self.maximum_duration),
                    )
                    .with_last_error(e),
                ))
            }
            r => r,
        }
    }

    fn remaining_time_now(&self, now: Instant) -> Option<Duration> {
        let remaining = self.deadline().saturating_duration_since(now);
        match self.inner.remaining_time() {
            Some(inner) => Some(std::cmp::min(remaining, inner)),
            None => Some(remaining),
        }
    }
}

impl RetryPolicy for LimitedElapsedTime {
    fn on_error(&mut self, idempotent: bool, error: Error) -> RetryResult {
        self.on_error_now(Instant::now(), idempotent, error)
    }

    fn is_permanent(&self, idempotent: bool, error: &Error) -> bool {
        self.inner.is_permanent(idempotent, error)
    }

    fn is_exhausted(&self) -> bool {
        Instant::now() >= self.deadline() || self.inner.is_exhausted()
    }

    fn remaining_time(&self) -> Option<Duration> {
        self.remaining_time_now(Instant::now())
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self {
            inner: self.inner.clone_policy(),
            maximum_duration: self.maximum_duration,
            start: Instant::now(),
        })
    }
}

/// A retry policy decorator that limits the number of transient errors.
///
/// This policy decorates an inner policy and limits the total number of
/// transient errors. Permanent errors do not count towards the limit. With a
/// maximum of `N` errors the loop makes at most `N + 1` attempts: the error
/// that exceeds the limit stops the loop with an [Exhausted] error.
#[derive(Debug)]
pub struct LimitedErrorCount {
    inner: Box<dyn RetryPolicy>,
    maximum_error_count: u32,
    error_count: u32,
}

impl LimitedErrorCount {
    /// Creates a new instance, with the [Aip194Strict] inner policy.
    pub fn new(maximum_error_count: u32) -> Self {
        Self::custom(Aip194Strict, maximum_error_count)
    }

    /// Creates a new instance with a custom inner policy.
    pub fn custom<P: RetryPolicy + 'static>(inner: P, maximum_error_count: u32) -> Self {
        Self {
            inner: Box::new(inner),
            maximum_error_count,
            error_count: 0,
        }
    }
}

impl RetryPolicy for LimitedErrorCount {
    fn on_error(&mut self, idempotent: bool, error: Error) -> RetryResult {
        match self.inner.on_error(idempotent, error) {
            RetryResult::Continue(e) => {
                self.error_count = self.error_count.saturating_add(1);
                if self.error_count > self.maximum_error_count {
                    return RetryResult::Exhausted(Error::exhausted(
                        Exhausted::new(
                            "error count",
                            self.error_count.to_string(),
                            self.maximum_error_count.to_string(),
                        )
                        .with_last_error(e),
                    ));
                }
                RetryResult::Continue(e)
            }
            r => r,
        }
    }

    fn is_permanent(&self, idempotent: bool, error: &Error) -> bool {
        self.inner.is_permanent(idempotent, error)
    }

    fn is_exhausted(&self) -> bool {
        self.error_count > self.maximum_error_count || self.inner.is_exhausted()
    }

    fn remaining_time(&self) -> Option<Duration> {
        self.inner.remaining_time()
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self {
            inner: self.inner.clone_policy(),
            maximum_error_count: self.maximum_error_count,
            error_count: 0,
        })
    }
}
