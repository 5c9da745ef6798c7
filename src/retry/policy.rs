//! Retry policies: the decision function plus an optional delay.

// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

type Decide<E> = Arc<dyn Fn(u32, &E) -> RetryDecision + Send + Sync>;
type ComputeDelay<E> = Arc<dyn Fn(u32, &E) -> StdDuration + Send + Sync>;

/// Boxed future yielding a deferred retry decision.
pub type DecisionFuture = Pin<Box<dyn Future<Output = bool> + Send>>;

/// Answer returned by a policy's decision function.
///
/// Decisions are either known immediately or produced later by a future (for
/// example after consulting a rate limiter). Both wrapper variants wait for a
/// pending decision before branching.
pub enum RetryDecision {
	/// The decision is available now.
	Ready(bool),
	/// The decision will be available once the future resolves.
	Pending(DecisionFuture),
}
impl RetryDecision {
	/// Wraps a future that produces the decision later.
	pub fn pending(decision: impl 'static + Send + Future<Output = bool>) -> Self {
		Self::Pending(Box::pin(decision))
	}

	/// Waits for the decision.
	pub async fn resolve(self) -> bool {
		match self {
			Self::Ready(retry) => retry,
			Self::Pending(decision) => decision.await,
		}
	}

	pub(crate) fn into_future(self) -> DecisionFuture {
		match self {
			Self::Ready(retry) => Box::pin(async move { retry }),
			Self::Pending(decision) => decision,
		}
	}
}
impl From<bool> for RetryDecision {
	fn from(retry: bool) -> Self {
		Self::Ready(retry)
	}
}
impl Debug for RetryDecision {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Ready(retry) => f.debug_tuple("RetryDecision::Ready").field(retry).finish(),
			Self::Pending(_) => f.write_str("RetryDecision::Pending(..)"),
		}
	}
}

/// Delay applied before a retry.
pub enum RetryDelay<E> {
	/// Retry immediately.
	None,
	/// Wait the same duration before every retry.
	Fixed(StdDuration),
	/// Ask a function given `(attempt, &error)`.
	Computed(ComputeDelay<E>),
}
impl<E> RetryDelay<E> {
	/// Builds a delay computed from the attempt number and the triggering error.
	pub fn computed(delay: impl 'static + Send + Sync + Fn(u32, &E) -> StdDuration) -> Self {
		Self::Computed(Arc::new(delay))
	}

	/// Capped exponential backoff with jitter.
	///
	/// Attempt `n` waits `min(base * 2^(n-1), cap)` plus a random jitter in `0..base`, which
	/// keeps concurrent transfers that hit the same failure from retrying in lockstep.
	pub fn exponential(base: StdDuration, cap: StdDuration) -> Self {
		Self::computed(move |attempt, _| {
			let exponent = attempt.saturating_sub(1).min(31);
			let backoff = base.saturating_mul(1_u32 << exponent).min(cap);
			let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
			let jitter = if base_ms > 0 { rand::rng().random_range(0..base_ms) } else { 0 };

			backoff.saturating_add(StdDuration::from_millis(jitter))
		})
	}

	/// Delay for the given failed attempt.
	pub fn for_attempt(&self, attempt: u32, error: &E) -> StdDuration {
		match self {
			Self::None => StdDuration::ZERO,
			Self::Fixed(delay) => *delay,
			Self::Computed(delay) => delay(attempt, error),
		}
	}

	/// Returns `true` when no delay was configured at all.
	pub fn is_none(&self) -> bool {
		matches!(self, Self::None)
	}
}
impl<E> Clone for RetryDelay<E> {
	fn clone(&self) -> Self {
		match self {
			Self::None => Self::None,
			Self::Fixed(delay) => Self::Fixed(*delay),
			Self::Computed(delay) => Self::Computed(delay.clone()),
		}
	}
}
impl<E> Default for RetryDelay<E> {
	fn default() -> Self {
		Self::None
	}
}
impl<E> From<StdDuration> for RetryDelay<E> {
	fn from(delay: StdDuration) -> Self {
		if delay.is_zero() { Self::None } else { Self::Fixed(delay) }
	}
}
impl<E> Debug for RetryDelay<E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::None => f.write_str("RetryDelay::None"),
			Self::Fixed(delay) => f.debug_tuple("RetryDelay::Fixed").field(delay).finish(),
			Self::Computed(_) => f.write_str("RetryDelay::Computed(..)"),
		}
	}
}

/// Decision function plus delay governing a retryable wrapper.
///
/// The policy alone bounds retries; the wrappers have no built-in cap, so a
/// policy answering `true` forever retries forever.
pub struct RetryPolicy<E> {
	decide: Decide<E>,
	delay: RetryDelay<E>,
}
impl<E> RetryPolicy<E> {
	/// Creates a policy from a decision function receiving `(attempt, &error)`.
	///
	/// `attempt` is 1 for the first failure of an outer call. The function may return a
	/// plain `bool` or a [`RetryDecision`].
	pub fn new<D>(decide: impl 'static + Send + Sync + Fn(u32, &E) -> D) -> Self
	where
		D: Into<RetryDecision>,
	{
		Self { decide: Arc::new(move |attempt, error| decide(attempt, error).into()), delay: RetryDelay::None }
	}

	/// Retries every failure until `max_retries` retries have been spent.
	pub fn max_retries(max_retries: u32) -> Self {
		Self::new(move |attempt, _| attempt <= max_retries)
	}

	/// Replaces the delay.
	pub fn with_delay(mut self, delay: impl Into<RetryDelay<E>>) -> Self {
		self.delay = delay.into();

		self
	}

	/// Computes the delay from `(attempt, &error)`.
	pub fn with_delay_fn(
		self,
		delay: impl 'static + Send + Sync + Fn(u32, &E) -> StdDuration,
	) -> Self {
		self.with_delay(RetryDelay::computed(delay))
	}

	/// Asks the decision function about a failure.
	pub fn should_retry(&self, attempt: u32, error: &E) -> RetryDecision {
		(self.decide)(attempt, error)
	}

	/// Delay to wait before retrying after the given failure.
	pub fn delay_for(&self, attempt: u32, error: &E) -> StdDuration {
		self.delay.for_attempt(attempt, error)
	}

	/// Configured delay.
	pub fn delay(&self) -> &RetryDelay<E> {
		&self.delay
	}
}
impl<E> Clone for RetryPolicy<E> {
	fn clone(&self) -> Self {
		Self { decide: self.decide.clone(), delay: self.delay.clone() }
	}
}
impl<E> Debug for RetryPolicy<E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RetryPolicy").field("delay", &self.delay).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn max_retries_bounds_attempts() {
		let policy = <RetryPolicy<()>>::max_retries(2);

		assert!(matches!(policy.should_retry(1, &()), RetryDecision::Ready(true)));
		assert!(matches!(policy.should_retry(2, &()), RetryDecision::Ready(true)));
		assert!(matches!(policy.should_retry(3, &()), RetryDecision::Ready(false)));
	}

	#[test]
	fn delay_variants_compute_expected_durations() {
		let none = <RetryDelay<u32>>::None;
		let fixed = <RetryDelay<u32>>::from(StdDuration::from_millis(250));
		let computed = <RetryDelay<u32>>::computed(|attempt, error| {
			StdDuration::from_millis(u64::from(attempt * 10 + *error))
		});

		assert_eq!(none.for_attempt(3, &0), StdDuration::ZERO);
		assert_eq!(fixed.for_attempt(3, &0), StdDuration::from_millis(250));
		assert_eq!(computed.for_attempt(3, &7), StdDuration::from_millis(37));
		assert!(<RetryDelay<u32>>::from(StdDuration::ZERO).is_none());
	}

	#[test]
	fn exponential_delay_doubles_until_capped() {
		let base = StdDuration::from_millis(100);
		let delay = <RetryDelay<()>>::exponential(base, StdDuration::from_millis(1_000));

		for (attempt, floor) in [(1, 100), (2, 200), (3, 400), (4, 800), (5, 1_000), (40, 1_000)] {
			let observed = delay.for_attempt(attempt, &());

			assert!(observed >= StdDuration::from_millis(floor), "attempt {attempt}: {observed:?}");
			assert!(observed < StdDuration::from_millis(floor) + base, "attempt {attempt}: {observed:?}");
		}
	}

	#[tokio::test]
	async fn pending_decisions_resolve() {
		let decision = RetryDecision::pending(async { true });

		assert!(decision.resolve().await);
		assert!(!RetryDecision::from(false).into_future().await);
	}
}
