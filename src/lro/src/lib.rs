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

//! Types and functions to poll long-running conditions with less boilerplate.
//!
//! Some requests start work that completes in the background, for example,
//! replicating the data in a table. The application polls the service until
//! the work completes. Polling requires a loop that (1) repeatedly issues a
//! query, (2) backs off between attempts, (3) stops on permanent errors or
//! when the [PollingPolicy] is exhausted, and (4) can be cancelled.
//!
//! [async_poll] runs such a loop in the background, scheduling each attempt
//! and each backoff timer on a [CompletionQueue]. It returns a
//! [PollingHandle], which can be awaited or cancelled.
//!
//! # Example
//! ```
//! # use gax::completion_queue::CompletionQueue;
//! # use gax::exponential_backoff::ExponentialBackoff;
//! # use gax::polling_policy::GenericPollingPolicy;
//! # use gax::retry_policy::{Aip194Strict, RetryPolicyExt};
//! # use gcloud_lro::{PollingResult, async_poll};
//! # tokio_test::block_on(async {
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//! let cq = CompletionQueue::new();
//! let policy = GenericPollingPolicy::new(
//!     Aip194Strict.with_time_limit(Duration::from_secs(60)),
//!     ExponentialBackoff::default(),
//! );
//! let count = Arc::new(AtomicUsize::new(0));
//! let handle = async_poll(&cq, Box::new(policy), "example", move |_remaining| {
//!     let count = count.clone();
//!     async move {
//!         // Pretend the work completes on the first attempt.
//!         count.fetch_add(1, Ordering::SeqCst);
//!         Ok(PollingResult::Completed("done"))
//!     }
//! });
//! assert_eq!(handle.await?, "done");
//! # gax::Result::<()>::Ok(()) });
//! ```

use gax::Result;
use gax::completion_queue::{AsyncOperation, CompletionQueue};
use gax::error::Error;
use gax::polling_policy::PollingPolicy;
use gax::retry_result::RetryResult;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const OPERATION_CANCELLED: &str = "Operation cancelled";

/// The result of a single polling attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum PollingResult<T> {
    /// The work is still in progress, the loop should try again.
    InProgress,
    /// The work completed. This includes the final value.
    Completed(T),
}

/// Starts a polling loop in the background.
///
/// Each attempt calls `query` with the time left in the policy, see
/// [PollingPolicy::remaining_time], and runs the returned future on `cq`. Between
/// attempts the loop waits for a timer scheduled on `cq`, with the delay
/// returned by [PollingPolicy::wait_period].
///
/// The loop resolves when:
/// * an attempt returns [PollingResult::Completed],
/// * an attempt fails with a permanent error, as classified by the policy,
/// * the policy is exhausted, either by errors or by time,
/// * the loop is cancelled via [PollingHandle::cancel()], or the backoff
///   timer is cancelled via the completion queue.
///
/// Responses reporting that the work is still in progress do not count as
/// errors.
///
/// # Parameters
/// * `cq` - schedules the attempts and the backoff timers.
/// * `policy` - a fresh policy, owned by this loop.
/// * `operation` - a name for the work, used in logs and error messages.
/// * `query` - creates the future for each attempt. The future should not
///   run longer than the remaining time it receives, an attempt that never
///   completes blocks the loop.
///
/// # Panics
/// If called outside the context of a tokio runtime.
pub fn async_poll<T, Q, QF>(
    cq: &CompletionQueue,
    policy: Box<dyn PollingPolicy>,
    operation: impl Into<String>,
    query: Q,
) -> PollingHandle<T>
where
    T: Send + 'static,
    Q: FnMut(Option<Duration>) -> QF + Send + 'static,
    QF: Future<Output = Result<PollingResult<T>>> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let polling = PollingLoop {
        cq: cq.clone(),
        policy,
        operation: operation.into(),
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(polling.run(query));
    PollingHandle { task, cancel }
}

/// A handle to a polling loop started by [async_poll].
///
/// Await the handle to get the final result of the loop. Dropping the handle
/// cancels the loop.
#[derive(Debug)]
pub struct PollingHandle<T> {
    task: JoinHandle<Result<T>>,
    cancel: CancellationToken,
}

impl<T> PollingHandle<T> {
    /// Requests cancellation of the polling loop.
    ///
    /// Cancellation is advisory. If there is an attempt in flight, the loop
    /// cancels it and waits for its result. A completed result wins over the
    /// cancellation, any other result resolves the loop with a cancelled
    /// error. If the loop is waiting for a backoff timer, the loop cancels
    /// the timer and resolves with the timer error.
    ///
    /// Cancelling a loop that already resolved has no effect.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true if the polling loop has resolved.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Drop for PollingHandle<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T> Future for PollingHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) => Poll::Ready(Err(Error::other(e))),
        }
    }
}

struct PollingLoop {
    cq: CompletionQueue,
    policy: Box<dyn PollingPolicy>,
    operation: String,
    cancel: CancellationToken,
}

impl PollingLoop {
    async fn run<T, Q, QF>(mut self, mut query: Q) -> Result<T>
    where
        T: Send + 'static,
        Q: FnMut(Option<Duration>) -> QF + Send + 'static,
        QF: Future<Output = Result<PollingResult<T>>> + Send + 'static,
    {
        let mut attempt_count = 0_u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::cancelled(OPERATION_CANCELLED));
            }
            attempt_count += 1;
            let remaining = self.policy.remaining_time();
            tracing::debug!(operation = %self.operation, attempt_count, ?remaining, "starting polling attempt");
            let attempt = self.cq.run_async(query(remaining));
            let (result, cancelled) = self.wait(attempt).await;
            match result {
                Ok(PollingResult::Completed(value)) => {
                    tracing::debug!(operation = %self.operation, attempt_count, "polling completed");
                    return Ok(value);
                }
                Ok(PollingResult::InProgress) if cancelled => {
                    return Err(Error::cancelled(OPERATION_CANCELLED));
                }
                Ok(PollingResult::InProgress) => {
                    if let Some(e) = self.policy.on_in_progress(&self.operation) {
                        tracing::warn!(operation = %self.operation, attempt_count, "polling stopped: {e}");
                        return Err(e);
                    }
                }
                Err(e) if self.policy.is_permanent_error(&e) => {
                    tracing::debug!(operation = %self.operation, attempt_count, "permanent error: {e}");
                    return Err(e);
                }
                Err(_) if cancelled => {
                    return Err(Error::cancelled(OPERATION_CANCELLED));
                }
                Err(e) => match self.policy.on_failure(e) {
                    RetryResult::Continue(e) => {
                        tracing::debug!(operation = %self.operation, attempt_count, "transient error: {e}");
                    }
                    RetryResult::Permanent(e) => return Err(e),
                    RetryResult::Exhausted(e) => {
                        tracing::warn!(operation = %self.operation, attempt_count, "polling policy exhausted: {e}");
                        return Err(e);
                    }
                },
            }

            let delay = self.policy.wait_period();
            tracing::debug!(operation = %self.operation, attempt_count, ?delay, "backing off");
            let timer = self.cq.make_relative_timer(delay);
            let (fired, _) = self.wait(timer).await;
            fired?;
        }
    }

    // Waits for `operation`, cancelling it if the loop is cancelled first.
    // Returns the result, and whether the loop was cancelled.
    async fn wait<R>(&self, mut operation: AsyncOperation<R>) -> (Result<R>, bool) {
        tokio::select! {
            biased;
            result = &mut operation => (result, self.cancel.is_cancelled()),
            _ = self.cancel.cancelled() => {
                operation.cancel();
                (operation.await, true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gax::error::rpc::{Code, Status};
    use gax::exponential_backoff::ExponentialBackoffBuilder;
    use gax::polling_policy::GenericPollingPolicy;
    use gax::retry_policy::{AlwaysRetry, RetryPolicyExt};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mockall::mock! {
        #[derive(Debug)]
        Policy {}
        impl PollingPolicy for Policy {
            fn is_permanent_error(&self, error: &Error) -> bool;
            fn on_failure(&mut self, error: Error) -> RetryResult;
            fn on_in_progress(&mut self, operation: &str) -> Option<Error>;
            fn wait_period(&mut self) -> Duration;
            fn remaining_time(&self) -> Option<Duration>;
            fn clone_policy(&self) -> Box<dyn PollingPolicy>;
        }
    }

    fn polling_loop(cq: &CompletionQueue, policy: MockPolicy) -> (PollingLoop, CancellationToken) {
        let cancel = CancellationToken::new();
        let polling = PollingLoop {
            cq: cq.clone(),
            policy: Box::new(policy),
            operation: "test-operation".to_string(),
            cancel: cancel.clone(),
        };
        (polling, cancel)
    }

    fn test_policy() -> Box<dyn PollingPolicy> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_delay(Duration::from_millis(10))
            .with_maximum_delay(Duration::from_millis(100))
            .clamp();
        Box::new(GenericPollingPolicy::new(
            AlwaysRetry.with_error_limit(5),
            backoff,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_in_progress() -> anyhow::Result<()> {
        let cq = CompletionQueue::new();
        let mut responses = vec![
            PollingResult::Completed(42),
            PollingResult::InProgress,
            PollingResult::InProgress,
        ];
        let handle = async_poll(&cq, test_policy(), "test-operation", move |_| {
            let response = responses.pop().expect("too many attempts");
            async move { Ok(response) }
        });
        assert_eq!(handle.await?, 42);
        assert_eq!(cq.pending_operations(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_from_transient_errors() -> anyhow::Result<()> {
        let cq = CompletionQueue::new();
        let mut responses = vec![
            Ok(PollingResult::Completed("done")),
            Err(Error::service(
                Status::default()
                    .set_code(Code::Unavailable)
                    .set_message("try-again"),
            )),
            Ok(PollingResult::InProgress),
        ];
        let handle = async_poll(&cq, test_policy(), "test-operation", move |_| {
            let response = responses.pop().expect("too many attempts");
            async move { response }
        });
        assert_eq!(handle.await?, "done");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_start() {
        let cq = CompletionQueue::new();
        let handle = async_poll(&cq, test_policy(), "test-operation", |_| async {
            Ok(PollingResult::<()>::InProgress)
        });
        handle.cancel();
        let err = handle.await.unwrap_err();
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(err.code(), Code::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn in_progress_after_cancel() {
        let mut policy = MockPolicy::new();
        policy.expect_remaining_time().return_const(None);
        policy.expect_on_in_progress().never();
        policy.expect_wait_period().never();
        let cq = CompletionQueue::new();
        let (polling, cancel) = polling_loop(&cq, policy);

        // The attempt reports the work is still in progress, after the loop
        // was cancelled.
        let count = Arc::new(AtomicUsize::new(0));
        let query_count = count.clone();
        let query = move |_| {
            query_count.fetch_add(1, Ordering::SeqCst);
            let cancel = cancel.clone();
            async move {
                cancel.cancel();
                Ok(PollingResult::<()>::InProgress)
            }
        };
        let err = polling.run(query).await.unwrap_err();
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(err.to_string(), "Operation cancelled");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(cq.pending_operations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_after_cancel() {
        let mut policy = MockPolicy::new();
        policy.expect_remaining_time().return_const(None);
        policy
            .expect_is_permanent_error()
            .times(1)
            .returning(|e| e.code() != Code::Unavailable);
        policy.expect_on_failure().never();
        policy.expect_wait_period().never();
        let cq = CompletionQueue::new();
        let (polling, cancel) = polling_loop(&cq, policy);

        let query = move |_| {
            let cancel = cancel.clone();
            async move {
                cancel.cancel();
                Err::<PollingResult<()>, _>(Error::service(
                    Status::default()
                        .set_code(Code::Unavailable)
                        .set_message("try-again"),
                ))
            }
        };
        let err = polling.run(query).await.unwrap_err();
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(err.to_string(), "Operation cancelled");
        assert_eq!(cq.pending_operations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn query_receives_remaining_time() -> anyhow::Result<()> {
        let mut policy = MockPolicy::new();
        let mut seq = mockall::Sequence::new();
        for s in [30, 20] {
            policy
                .expect_remaining_time()
                .once()
                .in_sequence(&mut seq)
                .return_const(Some(Duration::from_secs(s)));
        }
        policy.expect_on_in_progress().once().returning(|_| None);
        policy
            .expect_wait_period()
            .once()
            .return_const(Duration::from_secs(1));
        let cq = CompletionQueue::new();
        let (polling, _cancel) = polling_loop(&cq, policy);

        let (tx, rx) = std::sync::mpsc::channel();
        let query = move |remaining: Option<Duration>| {
            let _ = tx.send(remaining);
            let response = if remaining == Some(Duration::from_secs(20)) {
                PollingResult::Completed(())
            } else {
                PollingResult::InProgress
            };
            async move { Ok(response) }
        };
        polling.run(query).await?;
        let got = rx.try_iter().collect::<Vec<_>>();
        assert_eq!(
            got,
            [Some(Duration::from_secs(30)), Some(Duration::from_secs(20))]
        );
        Ok(())
    }
}
