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

//! Schedule cancellable asynchronous operations and timers.
//!
//! The [CompletionQueue] is the execution context for requests and timers
//! issued by the client libraries. Each operation runs as a task on the
//! current tokio runtime, and returns an [AsyncOperation] handle that can be
//! awaited or cancelled.
//!
//! The queue is cheap to clone, all clones share the same set of pending
//! operations. It is safe to schedule and cancel operations from any thread.
//!
//! # Example
//! ```
//! # use gcloud_gax::completion_queue::CompletionQueue;
//! # tokio_test::block_on(async {
//! use std::time::Duration;
//! let cq = CompletionQueue::new();
//! let timer = cq.make_relative_timer(Duration::from_millis(10));
//! let _fired_at = timer.await?;
//! # gcloud_gax::Result::<()>::Ok(()) });
//! ```

use crate::Result;
use crate::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const OPERATION_CANCELLED: &str = "Operation cancelled";
const TIMER_CANCELLED: &str = "timer canceled";
const QUEUE_SHUTDOWN: &str = "the completion queue is shut down";

/// Runs asynchronous operations and timers, and cancels them on demand.
#[derive(Clone, Debug, Default)]
pub struct CompletionQueue {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    // Parent of the tokens for all pending operations. Replaced by
    // `cancel_all()`, never replaced after `shutdown()`.
    generation: Mutex<CancellationToken>,
    shutdown: AtomicBool,
    pending: AtomicUsize,
}

impl CompletionQueue {
    /// Creates a new, empty, completion queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `future` as a cancellable operation.
    ///
    /// If the operation is cancelled before `future` completes, the operation
    /// resolves to an error where [is_cancelled()][Error::is_cancelled] is
    /// true, and `future` is dropped.
    ///
    /// # Panics
    /// If called outside the context of a tokio runtime.
    pub fn run_async<F, T>(&self, future: F) -> AsyncOperation<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.spawn(future, OPERATION_CANCELLED)
    }

    /// Creates a timer that fires after `duration`.
    ///
    /// The timer resolves to the instant when it fired, or to a cancelled
    /// error with a "timer canceled" message.
    ///
    /// # Panics
    /// If called outside the context of a tokio runtime.
    pub fn make_relative_timer(&self, duration: Duration) -> AsyncOperation<Instant> {
        self.spawn(
            async move {
                tokio::time::sleep(duration).await;
                Ok(Instant::now())
            },
            TIMER_CANCELLED,
        )
    }

    /// Cancels `operation`, which must have been created by this queue.
    ///
    /// Cancellation is advisory: an operation that already completed keeps
    /// its result.
    pub fn cancel<T>(&self, operation: &AsyncOperation<T>) {
        operation.cancel();
    }

    /// Cancels all pending operations and timers.
    ///
    /// The queue remains usable: operations created after this call are not
    /// affected.
    pub fn cancel_all(&self) {
        let mut generation = self.generation();
        generation.cancel();
        if !self.is_shutdown() {
            *generation = CancellationToken::new();
        }
    }

    /// Cancels all pending operations, and rejects any new operations.
    ///
    /// Operations created after this call resolve immediately to a cancelled
    /// error.
    pub fn shutdown(&self) {
        let generation = self.generation();
        self.inner.shutdown.store(true, Ordering::SeqCst);
        generation.cancel();
        tracing::debug!("completion queue shut down");
    }

    /// Returns true if [shutdown()][CompletionQueue::shutdown] was called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// The number of operations and timers that have not completed.
    pub fn pending_operations(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    fn generation(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.inner
            .generation
            .lock()
            .expect("completion queue lock is poisoned")
    }

    fn spawn<F, T>(&self, future: F, cancel_message: &'static str) -> AsyncOperation<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let cancel = self.generation().child_token();
        if self.is_shutdown() {
            let handle = tokio::spawn(async { Err(Error::cancelled(QUEUE_SHUTDOWN)) });
            return AsyncOperation { handle, cancel };
        }
        let guard = PendingGuard::new(self.inner.clone());
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::cancelled(cancel_message)),
                r = future => r,
            }
        });
        AsyncOperation { handle, cancel }
    }
}

/// Tracks an operation in [CompletionQueue::pending_operations].
struct PendingGuard(Arc<Inner>);

impl PendingGuard {
    fn new(inner: Arc<Inner>) -> Self {
        inner.pending.fetch_add(1, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A pending operation created by a [CompletionQueue].
///
/// Await the operation to get its result. Dropping the handle does not cancel
/// the operation, use [cancel()][AsyncOperation::cancel] for that.
#[derive(Debug)]
pub struct AsyncOperation<T> {
    handle: JoinHandle<Result<T>>,
    cancel: CancellationToken,
}

impl<T> AsyncOperation<T> {
    /// Requests cancellation of the operation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true if the operation has completed, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for AsyncOperation<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match std::task::ready!(Pin::new(&mut this.handle).poll(cx)) {
            Ok(r) => Poll::Ready(r),
            Err(e) => Poll::Ready(Err(Error::other(e))),
        }
    }
}
