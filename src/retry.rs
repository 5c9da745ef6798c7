//! Retry wrappers that add retry-with-backoff semantics to an arbitrary call.
//!
//! [`Retryable`] wraps asynchronous targets and always returns a future. [`SyncRetryable`]
//! wraps synchronous targets and stays synchronous on the happy path: its [`Outcome`] only
//! becomes pending when a failure's retry decision is itself pending.
//!
//! Receivers are bound by capturing them in the target closure. Arguments are cloned for every
//! attempt, so each retry invokes the target with the caller's original arguments.

mod outcome;
mod policy;

pub use outcome::*;
pub use policy::*;

// self
use crate::{_prelude::*, obs};

/// Ways a retry wrapper can be used that it cannot honor.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RetryMisuse {
	/// A synchronous target failed and the policy asked to wait before retrying.
	#[error(
		"Retry delay of {delay:?} requested for attempt {attempt}, but delays are not supported for synchronous calls."
	)]
	DelayOnSynchronousCall {
		/// Attempt number that requested the delay.
		attempt: u32,
		/// Requested delay.
		delay: StdDuration,
	},
}

/// Retry wrapper around an asynchronous target.
pub struct Retryable<F, E> {
	target: F,
	policy: RetryPolicy<E>,
}
impl<F, E> Clone for Retryable<F, E>
where
	F: Clone,
{
	fn clone(&self) -> Self {
		Self { target: self.target.clone(), policy: self.policy.clone() }
	}
}
impl<F, E> Debug for Retryable<F, E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Retryable").field("policy", &self.policy).finish_non_exhaustive()
	}
}
impl<F, E> Retryable<F, E> {
	/// Wraps `target` with `policy`.
	pub fn new(target: F, policy: RetryPolicy<E>) -> Self {
		Self { target, policy }
	}

	/// Policy governing this wrapper.
	pub fn policy(&self) -> &RetryPolicy<E> {
		&self.policy
	}

	/// Invokes the target, retrying failures for as long as the policy approves.
	///
	/// The original error is returned unchanged once the policy declines.
	pub async fn call<A, Fut, T>(&self, args: A) -> Result<T, E>
	where
		F: Fn(A) -> Fut,
		Fut: Future<Output = Result<T, E>>,
		A: Clone,
	{
		let mut attempt = 0_u32;

		loop {
			let error = match (self.target)(args.clone()).await {
				Ok(value) => return Ok(value),
				Err(e) => e,
			};

			attempt = attempt.saturating_add(1);

			if !self.policy.should_retry(attempt, &error).resolve().await {
				return Err(error);
			}

			let delay = self.policy.delay_for(attempt, &error);

			obs::record_retry(attempt, delay);

			if !delay.is_zero() {
				tokio::time::sleep(delay).await;
			}
		}
	}
}

/// Retry wrapper around a synchronous target.
pub struct SyncRetryable<F, E> {
	target: F,
	policy: RetryPolicy<E>,
}
impl<F, E> Clone for SyncRetryable<F, E>
where
	F: Clone,
{
	fn clone(&self) -> Self {
		Self { target: self.target.clone(), policy: self.policy.clone() }
	}
}
impl<F, E> Debug for SyncRetryable<F, E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SyncRetryable").field("policy", &self.policy).finish_non_exhaustive()
	}
}
impl<F, E> SyncRetryable<F, E> {
	/// Wraps `target` with `policy`.
	pub fn new(target: F, policy: RetryPolicy<E>) -> Self {
		Self { target, policy }
	}

	/// Policy governing this wrapper.
	pub fn policy(&self) -> &RetryPolicy<E> {
		&self.policy
	}

	/// Invokes the target, retrying failures for as long as the policy approves.
	///
	/// Returns [`Outcome::Ready`] unless a failure's retry decision is pending, in which case the
	/// rest of the call continues inside [`Outcome::Pending`]. Synchronous calls never sleep: an
	/// approved retry with a non-zero delay fails with [`RetryMisuse::DelayOnSynchronousCall`].
	pub fn call<'a, A, T>(&'a self, args: A) -> Outcome<'a, T, E>
	where
		F: Sync + Fn(A) -> Result<T, E>,
		A: 'a + Send + Clone,
		T: 'a + Send,
		E: 'a + Send + From<RetryMisuse>,
	{
		let mut attempt = 0_u32;

		loop {
			let error = match (self.target)(args.clone()) {
				Ok(value) => return Outcome::Ready(Ok(value)),
				Err(e) => e,
			};

			attempt = attempt.saturating_add(1);

			match self.policy.should_retry(attempt, &error) {
				RetryDecision::Ready(false) => return Outcome::Ready(Err(error)),
				RetryDecision::Ready(true) =>
					if let Err(misuse) = self.ensure_no_delay(attempt, &error) {
						return Outcome::Ready(Err(misuse.into()));
					},
				RetryDecision::Pending(decision) =>
					return Outcome::Pending(Box::pin(self.resume(args, attempt, error, decision))),
			}
		}
	}

	async fn resume<A, T>(
		&self,
		args: A,
		mut attempt: u32,
		mut error: E,
		mut decision: DecisionFuture,
	) -> Result<T, E>
	where
		F: Fn(A) -> Result<T, E>,
		A: Clone,
		E: From<RetryMisuse>,
	{
		loop {
			if !decision.await {
				return Err(error);
			}

			self.ensure_no_delay(attempt, &error)?;

			match (self.target)(args.clone()) {
				Ok(value) => return Ok(value),
				Err(e) => {
					attempt = attempt.saturating_add(1);
					decision = self.policy.should_retry(attempt, &e).into_future();
					error = e;
				},
			}
		}
	}

	fn ensure_no_delay(&self, attempt: u32, error: &E) -> Result<(), RetryMisuse> {
		let delay = self.policy.delay_for(attempt, error);

		if !delay.is_zero() {
			return Err(RetryMisuse::DelayOnSynchronousCall { attempt, delay });
		}

		obs::record_retry(attempt, delay);

		Ok(())
	}
}

/// Wraps an asynchronous target with `policy`.
pub fn make_retryable<F, E>(target: F, policy: RetryPolicy<E>) -> Retryable<F, E> {
	Retryable::new(target, policy)
}

/// Wraps a synchronous target with `policy`.
pub fn make_sync_retryable<F, E>(target: F, policy: RetryPolicy<E>) -> SyncRetryable<F, E> {
	SyncRetryable::new(target, policy)
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// self
	use super::*;

	#[derive(Debug, PartialEq, Eq)]
	enum TestError {
		Fail(u32),
		Misuse(RetryMisuse),
	}
	impl From<RetryMisuse> for TestError {
		fn from(e: RetryMisuse) -> Self {
			Self::Misuse(e)
		}
	}

	fn failing_until(calls: &Arc<AtomicU32>, success_on: u32) -> impl Fn(u32) -> Result<u32, TestError> {
		let calls = calls.clone();

		move |input| {
			let call = calls.fetch_add(1, Ordering::SeqCst) + 1;

			if call >= success_on { Ok(input * 2) } else { Err(TestError::Fail(call)) }
		}
	}

	#[test]
	fn sync_success_is_ready_and_transparent() {
		let calls = Arc::new(AtomicU32::new(0));
		let retryable = make_sync_retryable(failing_until(&calls, 1), RetryPolicy::max_retries(3));

		assert!(matches!(retryable.call(21), Outcome::Ready(Ok(42))));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn sync_declined_retry_returns_original_error() {
		let calls = Arc::new(AtomicU32::new(0));
		let seen = Arc::new(Mutex::new(Vec::new()));
		let policy = {
			let seen = seen.clone();

			RetryPolicy::new(move |attempt, error: &TestError| {
				seen.lock().push(attempt);

				matches!(error, TestError::Fail(call) if *call < 3)
			})
		};
		let retryable = make_sync_retryable(failing_until(&calls, u32::MAX), policy);

		match retryable.call(1) {
			Outcome::Ready(result) => assert_eq!(result, Err(TestError::Fail(3))),
			Outcome::Pending(_) => panic!("Synchronous decisions should keep the call ready."),
		}

		assert_eq!(*seen.lock(), vec![1, 2, 3]);
	}

	#[test]
	fn sync_delay_is_rejected() {
		let calls = Arc::new(AtomicU32::new(0));
		let policy = RetryPolicy::max_retries(3).with_delay(StdDuration::from_millis(5));
		let retryable = make_sync_retryable(failing_until(&calls, 2), policy);

		match retryable.call(1) {
			Outcome::Ready(Err(TestError::Misuse(RetryMisuse::DelayOnSynchronousCall {
				attempt,
				delay,
			}))) => {
				assert_eq!(attempt, 1);
				assert_eq!(delay, StdDuration::from_millis(5));
			},
			other => panic!("Expected a delay misuse, got {:?}.", other.ready()),
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn sync_pending_decision_turns_call_pending() {
		let calls = Arc::new(AtomicU32::new(0));
		let policy = RetryPolicy::new(|attempt, _: &TestError| {
			RetryDecision::pending(async move { attempt < 2 })
		});
		let retryable = make_sync_retryable(failing_until(&calls, 3), policy);
		let outcome = retryable.call(5);

		assert!(!outcome.is_ready());
		assert_eq!(outcome.await, Err(TestError::Fail(2)));
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn async_retries_until_success_with_fresh_arguments() {
		let calls = Arc::new(AtomicU32::new(0));
		let target = {
			let calls = calls.clone();

			move |input: String| {
				let calls = calls.clone();

				async move {
					let call = calls.fetch_add(1, Ordering::SeqCst) + 1;

					if call < 3 { Err(TestError::Fail(call)) } else { Ok(format!("{input}:{call}")) }
				}
			}
		};
		let retryable = make_retryable(target, RetryPolicy::max_retries(5));

		assert_eq!(retryable.call("photo".to_owned()).await, Ok("photo:3".to_owned()));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn async_counters_are_independent_per_call() {
		let attempts = Arc::new(Mutex::new(Vec::new()));
		let policy = {
			let attempts = attempts.clone();

			RetryPolicy::new(move |attempt, _: &TestError| {
				attempts.lock().push(attempt);

				attempt < 2
			})
		};
		let retryable = make_retryable(|_: ()| async { Err::<(), _>(TestError::Fail(0)) }, policy);

		assert!(retryable.call(()).await.is_err());
		assert!(retryable.call(()).await.is_err());
		assert_eq!(*attempts.lock(), vec![1, 2, 1, 2]);
	}

	#[tokio::test]
	async fn async_applies_computed_delay() {
		let delays = Arc::new(Mutex::new(Vec::new()));
		let policy = {
			let delays = delays.clone();

			RetryPolicy::max_retries(2).with_delay_fn(move |attempt, _: &TestError| {
				let delay = StdDuration::from_millis(u64::from(attempt) * 5);

				delays.lock().push(delay);

				delay
			})
		};
		let retryable = make_retryable(|_: ()| async { Err::<(), _>(TestError::Fail(0)) }, policy);
		let started = std::time::Instant::now();

		assert_eq!(retryable.call(()).await, Err(TestError::Fail(0)));
		assert!(started.elapsed() >= StdDuration::from_millis(15));
		assert_eq!(*delays.lock(), vec![StdDuration::from_millis(5), StdDuration::from_millis(10)]);
	}

	fn async_failing_until(
		calls: &Arc<AtomicU32>,
		success_on: u32,
	) -> impl Fn(u32) -> std::future::Ready<Result<u32, TestError>> {
		let target = failing_until(calls, success_on);

		move |input| std::future::ready(target(input))
	}

	#[tokio::test]
	async fn should_retry_runs_once_per_failure() {
		for failures in 0..=3 {
			let consulted = Arc::new(AtomicU32::new(0));
			let policy = {
				let consulted = consulted.clone();

				RetryPolicy::new(move |_, _: &TestError| {
					consulted.fetch_add(1, Ordering::SeqCst);

					true
				})
			};
			let async_calls = Arc::new(AtomicU32::new(0));
			let retryable =
				make_retryable(async_failing_until(&async_calls, failures + 1), policy.clone());

			assert_eq!(retryable.call(4).await, Ok(8));
			assert_eq!(async_calls.load(Ordering::SeqCst), failures + 1);
			assert_eq!(consulted.swap(0, Ordering::SeqCst), failures);

			let sync_calls = Arc::new(AtomicU32::new(0));
			let retryable = make_sync_retryable(failing_until(&sync_calls, failures + 1), policy);

			assert!(matches!(retryable.call(4), Outcome::Ready(Ok(8))));
			assert_eq!(sync_calls.load(Ordering::SeqCst), failures + 1);
			assert_eq!(consulted.load(Ordering::SeqCst), failures);
		}
	}

	#[tokio::test]
	async fn declining_the_first_failure_invokes_once() {
		let calls = Arc::new(AtomicU32::new(0));
		let retryable = make_retryable(
			async_failing_until(&calls, u32::MAX),
			RetryPolicy::new(|_, _: &TestError| false),
		);

		assert_eq!(retryable.call(1).await, Err(TestError::Fail(1)));
		assert_eq!(calls.load(Ordering::SeqCst), 1);

		let calls = Arc::new(AtomicU32::new(0));
		let retryable = make_sync_retryable(
			failing_until(&calls, u32::MAX),
			RetryPolicy::new(|_, _: &TestError| false),
		);

		assert!(matches!(retryable.call(1), Outcome::Ready(Err(TestError::Fail(1)))));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn async_waits_for_pending_decisions() {
		let calls = Arc::new(AtomicU32::new(0));
		let policy = RetryPolicy::new(|attempt, _: &TestError| {
			RetryDecision::pending(async move {
				tokio::time::sleep(StdDuration::from_millis(5)).await;

				attempt < 2
			})
		});
		let retryable = make_retryable(async_failing_until(&calls, u32::MAX), policy);

		assert_eq!(retryable.call(1).await, Err(TestError::Fail(2)));
		assert_eq!(calls.load(Ordering::SeqCst), 2);

		let calls = Arc::new(AtomicU32::new(0));
		let policy = RetryPolicy::new(|_, _: &TestError| RetryDecision::pending(async { true }));
		let retryable = make_retryable(async_failing_until(&calls, 3), policy);

		assert_eq!(retryable.call(5).await, Ok(10));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn overlapping_calls_keep_separate_counters() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let policy = {
			let seen = seen.clone();

			RetryPolicy::new(move |attempt, error: &TestError| {
				if let TestError::Fail(tag) = error {
					seen.lock().push((*tag, attempt));
				}

				attempt < 3
			})
		};
		let retryable = make_retryable(
			|tag: u32| async move {
				tokio::task::yield_now().await;

				Err::<(), _>(TestError::Fail(tag))
			},
			policy,
		);
		let (first, second) = tokio::join!(retryable.call(1), retryable.call(2));

		assert_eq!(first, Err(TestError::Fail(1)));
		assert_eq!(second, Err(TestError::Fail(2)));

		let seen = seen.lock();
		let attempts_for = |tag| {
			seen.iter().filter(|(seen_tag, _)| *seen_tag == tag).map(|(_, a)| *a).collect::<Vec<_>>()
		};

		assert_eq!(attempts_for(1), vec![1, 2, 3]);
		assert_eq!(attempts_for(2), vec![1, 2, 3]);
		assert!(
			seen.windows(2).any(|pair| pair[0].0 != pair[1].0),
			"The two calls should interleave."
		);
	}
}
