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

//! The retry loop used by unary requests and page fetches.

use crate::Result;
use crate::backoff_policy::BackoffPolicy;
use crate::error::Error;
use crate::retry_policy::RetryPolicy;
use crate::retry_result::RetryResult;
use std::time::Duration;

/// Runs the retry loop for a given function.
///
/// This functions calls an inner function as long as (1) the retry policy has
/// not expired, and (2) the inner function has not returned a successful
/// response.
///
/// In between calls the function waits the amount of time prescribed by the
/// backoff policy, using `sleep` to implement any sleep. If `sleep` fails, for
/// example because its timer was cancelled, the loop stops and returns that
/// error. The inner function receives the remaining time in the retry policy,
/// if any.
///
/// The policies are owned by the loop, callers should provide fresh instances
/// via `clone_policy()`.
pub async fn retry_loop<F, S, Response>(
    mut inner: F,
    sleep: S,
    idempotent: bool,
    mut retry_policy: Box<dyn RetryPolicy>,
    mut backoff_policy: Box<dyn BackoffPolicy>,
) -> Result<Response>
where
    F: AsyncFnMut(Option<Duration>) -> Result<Response> + Send,
    S: AsyncFn(Duration) -> Result<()> + Send,
{
    let mut attempt_count = 0_u32;
    loop {
        let remaining_time = retry_policy.remaining_time();
        attempt_count += 1;
        let error = match inner(remaining_time).await {
            Ok(r) => return Ok(r),
            Err(e) => e,
        };
        let error = match retry_policy.on_error(idempotent, error) {
            RetryResult::Permanent(e) => {
                tracing::debug!(attempt_count, "permanent error in retry loop: {e}");
                return Err(e);
            }
            RetryResult::Exhausted(e) => {
                tracing::warn!(attempt_count, "retry loop exhausted: {e}");
                return Err(e);
            }
            RetryResult::Continue(e) => e,
        };
        let delay = backoff_policy.on_completion();
        if retry_policy
            .remaining_time()
            .is_some_and(|remaining| remaining < delay)
        {
            tracing::warn!(attempt_count, ?delay, "retry loop has no time to back off: {error}");
            return Err(Error::exhausted(error));
        }
        tracing::debug!(attempt_count, ?delay, "retrying after transient error: {error}");
        if let Err(e) = sleep(delay).await {
            tracing::debug!(attempt_count, "retry loop backoff interrupted: {e}");
            return Err(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff_policy::tests::MockBackoff;
    use crate::error::rpc::{Code, Status};
    use crate::retry_policy::tests::MockPolicy;
    use std::future::Future;
    use test_case::test_case;

    #[tokio::test]
    async fn immediate_success() -> anyhow::Result<()> {
        // This test simulates a server immediately returning a successful
        // response.
        let mut call = MockCall::new();
        call.expect_call().once().returning(|_| success());
        let inner = async move |d| call.call(d);

        let mut retry_policy = MockPolicy::new();
        retry_policy
            .expect_remaining_time()
            .once()
            .return_const(None);
        let backoff_policy = MockBackoff::new();
        let sleep = MockSleep::new();

        let sleep = async move |d| sleep.sleep(d).await;
        let response = retry_loop(
            inner,
            sleep,
            true,
            Box::new(retry_policy),
            Box::new(backoff_policy),
        )
        .await?;
        assert_eq!(response, "success");
        Ok(())
    }

    #[tokio::test]
    async fn immediate_failure() -> anyhow::Result<()> {
        // This test simulates a server responding with an immediate and
        // permanent error.
        let mut call = MockCall::new();
        call.expect_call().once().returning(|_| permanent());
        let inner = async move |d| call.call(d);

        let mut retry_policy = MockPolicy::new();
        retry_policy
            .expect_remaining_time()
            .once()
            .return_const(None);
        retry_policy
            .expect_on_error()
            .once()
            .returning(|_, e| RetryResult::Permanent(e));
        let backoff_policy = MockBackoff::new();
        let sleep = MockSleep::new();

        let sleep = async move |d| sleep.sleep(d).await;
        let response = retry_loop(
            inner,
            sleep,
            true,
            Box::new(retry_policy),
            Box::new(backoff_policy),
        )
        .await;
        let err = response.unwrap_err();
        assert_eq!(err.status(), Some(&permanent_status()));
        Ok(())
    }

    #[test_case(true)]
    #[test_case(false)]
    #[tokio::test]
    async fn retry_success(expected_idempotency: bool) -> anyhow::Result<()> {
        // This test simulates a server responding with two transient errors and
        // then with a successful response.
        let mut call_seq = mockall::Sequence::new();
        let mut call = MockCall::new();
        call.expect_call()
            .once()
            .in_sequence(&mut call_seq)
            .withf(|got| got == &Some(Duration::from_secs(3)))
            .returning(|_| transient());
        call.expect_call()
            .once()
            .in_sequence(&mut call_seq)
            .withf(|got| got == &Some(Duration::from_secs(2)))
            .returning(|_| transient());
        call.expect_call()
            .once()
            .in_sequence(&mut call_seq)
            .withf(|got| got == &Some(Duration::from_secs(1)))
            .returning(|_| success());
        let inner = async move |d| call.call(d);

        // Each attempt queries the remaining time once before the attempt, and
        // once more before backing off.
        let mut retry_seq = mockall::Sequence::new();
        let mut retry_policy = MockPolicy::new();
        for s in [3, 10, 2, 10, 1] {
            retry_policy
                .expect_remaining_time()
                .once()
                .in_sequence(&mut retry_seq)
                .return_const(Some(Duration::from_secs(s)));
        }
        retry_policy
            .expect_on_error()
            .times(2)
            .withf(move |idempotent, _| idempotent == &expected_idempotency)
            .returning(|_, e| RetryResult::Continue(e));

        let mut backoff_seq = mockall::Sequence::new();
        let mut backoff_policy = MockBackoff::new();
        let mut sleep_seq = mockall::Sequence::new();
        let mut sleep = MockSleep::new();
        for d in 1..=2 {
            backoff_policy
                .expect_on_completion()
                .once()
                .in_sequence(&mut backoff_seq)
                .return_const(Duration::from_millis(d));
            sleep
                .expect_sleep()
                .once()
                .in_sequence(&mut sleep_seq)
                .withf(move |got| got == &Duration::from_millis(d))
                .returning(|_| Box::pin(async { Ok(()) }));
        }

        let sleep = async move |d| sleep.sleep(d).await;
        let response = retry_loop(
            inner,
            sleep,
            expected_idempotency,
            Box::new(retry_policy),
            Box::new(backoff_policy),
        )
        .await;
        assert!(matches!(&response, Ok(s) if s == "success"), "{response:?}");
        Ok(())
    }

    #[tokio::test]
    async fn too_many_transients() -> anyhow::Result<()> {
        // This test simulates a server responding with transient errors until
        // the retry policy stops the loop.
        const ERRORS: usize = 3;
        let mut call_seq = mockall::Sequence::new();
        let mut call = MockCall::new();
        for i in 0..ERRORS {
            call.expect_call()
                .once()
                .withf(|d| d.is_none())
                .in_sequence(&mut call_seq)
                .returning(move |_| numbered_transient(i));
        }
        let inner = async move |d| call.call(d);

        let mut retry_seq = mockall::Sequence::new();
        let mut retry_policy = MockPolicy::new();
        retry_policy.expect_remaining_time().return_const(None);
        retry_policy
            .expect_on_error()
            .times(ERRORS - 1)
            .in_sequence(&mut retry_seq)
            .returning(|_, e| RetryResult::Continue(e));
        retry_policy
            .expect_on_error()
            .once()
            .in_sequence(&mut retry_seq)
            .returning(|_, e| RetryResult::Exhausted(Error::exhausted(e)));

        let mut backoff_policy = MockBackoff::new();
        backoff_policy
            .expect_on_completion()
            .times(ERRORS - 1)
            .return_const(Duration::from_millis(10));
        let mut sleep = MockSleep::new();
        sleep
            .expect_sleep()
            .times(ERRORS - 1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let sleep = async move |d| sleep.sleep(d).await;
        let response = retry_loop(
            inner,
            sleep,
            true,
            Box::new(retry_policy),
            Box::new(backoff_policy),
        )
        .await;
        let err = response.unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
        assert_eq!(err.code(), Code::Unavailable);
        assert!(err.to_string().contains("try-again-2"), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn transient_then_permanent() -> anyhow::Result<()> {
        let mut call_seq = mockall::Sequence::new();
        let mut call = MockCall::new();
        call.expect_call()
            .once()
            .in_sequence(&mut call_seq)
            .returning(|_| transient());
        call.expect_call()
            .once()
            .in_sequence(&mut call_seq)
            .returning(|_| permanent());
        let inner = async move |d| call.call(d);

        let mut retry_seq = mockall::Sequence::new();
        let mut retry_policy = MockPolicy::new();
        retry_policy.expect_remaining_time().return_const(None);
        retry_policy
            .expect_on_error()
            .once()
            .in_sequence(&mut retry_seq)
            .returning(|_, e| RetryResult::Continue(e));
        retry_policy
            .expect_on_error()
            .once()
            .in_sequence(&mut retry_seq)
            .returning(|_, e| RetryResult::Permanent(e));

        let mut backoff_policy = MockBackoff::new();
        backoff_policy
            .expect_on_completion()
            .once()
            .return_const(Duration::from_millis(10));
        let mut sleep = MockSleep::new();
        sleep
            .expect_sleep()
            .once()
            .returning(|_| Box::pin(async { Ok(()) }));

        let sleep = async move |d| sleep.sleep(d).await;
        let response = retry_loop(
            inner,
            sleep,
            true,
            Box::new(retry_policy),
            Box::new(backoff_policy),
        )
        .await;
        let err = response.unwrap_err();
        assert_eq!(err.status(), Some(&permanent_status()));
        Ok(())
    }

    #[tokio::test]
    async fn no_sleep_past_overall_timeout() -> anyhow::Result<()> {
        let mut call = MockCall::new();
        call.expect_call().once().returning(|_| transient());
        let inner = async move |d| call.call(d);

        let mut seq = mockall::Sequence::new();
        let mut retry_policy = MockPolicy::new();
        retry_policy
            .expect_remaining_time()
            .once()
            .in_sequence(&mut seq)
            .return_const(Some(Duration::from_secs(10)));
        retry_policy
            .expect_on_error()
            .once()
            .in_sequence(&mut seq)
            .returning(|_, e| RetryResult::Continue(e));
        retry_policy
            .expect_remaining_time()
            .once()
            .in_sequence(&mut seq)
            .return_const(Some(Duration::from_secs(1)));

        let mut backoff_policy = MockBackoff::new();
        backoff_policy
            .expect_on_completion()
            .once()
            .return_const(Duration::from_secs(5));
        let sleep = MockSleep::new();

        let sleep = async move |d| sleep.sleep(d).await;
        let response = retry_loop(
            inner,
            sleep,
            true,
            Box::new(retry_policy),
            Box::new(backoff_policy),
        )
        .await;
        let err = response.unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
        assert_eq!(err.code(), Code::Unavailable);
        Ok(())
    }

    #[tokio::test]
    async fn sleep_error_stops_loop() -> anyhow::Result<()> {
        // This test simulates the backoff timer being cancelled, the loop
        // must not start another attempt.
        let mut call = MockCall::new();
        call.expect_call().once().returning(|_| transient());
        let inner = async move |d| call.call(d);

        let mut retry_policy = MockPolicy::new();
        retry_policy.expect_remaining_time().return_const(None);
        retry_policy
            .expect_on_error()
            .once()
            .returning(|_, e| RetryResult::Continue(e));
        let mut backoff_policy = MockBackoff::new();
        backoff_policy
            .expect_on_completion()
            .once()
            .return_const(Duration::from_secs(1));
        let mut sleep = MockSleep::new();
        sleep
            .expect_sleep()
            .once()
            .returning(|_| Box::pin(async { Err(Error::cancelled("timer canceled")) }));

        let sleep = async move |d| sleep.sleep(d).await;
        let response = retry_loop(
            inner,
            sleep,
            true,
            Box::new(retry_policy),
            Box::new(backoff_policy),
        )
        .await;
        let err = response.unwrap_err();
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(err.to_string(), "timer canceled");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn with_real_policies() -> anyhow::Result<()> {
        use crate::exponential_backoff::ExponentialBackoffBuilder;
        use crate::retry_policy::{Aip194Strict, RetryPolicyExt};

        let mut count = 0;
        let inner = async |_: Option<Duration>| {
            count += 1;
            if count < 3 { transient() } else { success() }
        };
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_delay(Duration::from_millis(1))
            .with_maximum_delay(Duration::from_millis(5))
            .build()?;
        let response = retry_loop(
            inner,
            async |d| {
                tokio::time::sleep(d).await;
                Ok(())
            },
            true,
            Box::new(Aip194Strict.with_error_limit(5)),
            Box::new(backoff),
        )
        .await?;
        assert_eq!(response, "success");
        assert_eq!(count, 3);
        Ok(())
    }

    fn success() -> Result<String> {
        Ok("success".into())
    }

    fn transient_status() -> Status {
        Status::default()
            .set_code(Code::Unavailable)
            .set_message("try-again")
    }

    fn transient() -> Result<String> {
        Err(Error::service(transient_status()))
    }

    fn numbered_transient(i: usize) -> Result<String> {
        Err(Error::service(
            transient_status().set_message(format!("try-again-{i}")),
        ))
    }

    fn permanent_status() -> Status {
        Status::default()
            .set_code(Code::PermissionDenied)
            .set_message("uh-oh")
    }

    fn permanent() -> Result<String> {
        Err(Error::service(permanent_status()))
    }

    trait Call {
        fn call(&self, d: Option<Duration>) -> Result<String>;
    }

    mockall::mock! {
        Call {}
        impl Call for Call {
            fn call(&self, d: Option<Duration>) -> Result<String>;
        }
    }

    trait Sleep {
        fn sleep(&self, d: Duration) -> impl Future<Output = Result<()>>;
    }

    mockall::mock! {
        Sleep {}
        impl Sleep for Sleep {
            fn sleep(&self, d: Duration) -> impl Future<Output = Result<()>> + Send;
        }
    }
}
