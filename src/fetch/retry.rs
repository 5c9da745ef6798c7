//! Retrying wrapper around [`PreAuthedFetch`].

// crates.io
use reqwest::Response;
// self
use crate::{
	_prelude::*,
	error::TransientError,
	fetch::{FetchRequest, PreAuthedFetch},
	http::{self, TokenHttpClient},
	retry::{RetryDelay, RetryPolicy, Retryable},
};

/// Retry settings for [`make_fetch_with_retry`].
#[derive(Clone, Debug)]
pub struct FetchRetryOptions {
	/// Retries after the first attempt.
	pub retries: u32,
	/// Response statuses that trigger a retry.
	pub retryable_status_codes: Vec<u16>,
	/// Delay before each retry.
	pub retry_delay: RetryDelay<Error>,
	/// Upper bound on a server's `Retry-After` hint; a hint up to this bound replaces a
	/// shorter [`retry_delay`](Self::retry_delay). Zero ignores hints.
	pub max_retry_after: StdDuration,
}
impl FetchRetryOptions {
	/// Statuses retried by default.
	pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 8] = [408, 409, 429, 500, 502, 503, 504, 599];

	/// Overrides the retry count.
	pub fn with_retries(mut self, retries: u32) -> Self {
		self.retries = retries;

		self
	}

	/// Overrides the retryable statuses.
	pub fn with_retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
		self.retryable_status_codes = codes.into_iter().collect();

		self
	}

	/// Overrides the delay between retries.
	pub fn with_retry_delay(mut self, delay: impl Into<RetryDelay<Error>>) -> Self {
		self.retry_delay = delay.into();

		self
	}

	/// Overrides the cap on honored `Retry-After` hints.
	pub fn with_max_retry_after(mut self, cap: StdDuration) -> Self {
		self.max_retry_after = cap;

		self
	}

	fn policy(&self) -> RetryPolicy<Error> {
		let retries = self.retries;
		let delay = self.retry_delay.clone();
		let cap = self.max_retry_after;

		RetryPolicy::new(move |attempt, error: &Error| attempt <= retries && error.is_transient())
			.with_delay_fn(move |attempt, error| {
				let configured = delay.for_attempt(attempt, error);

				match retry_after_hint(error) {
					Some(hint) => configured.max(hint.min(cap)),
					None => configured,
				}
			})
	}
}
impl Default for FetchRetryOptions {
	fn default() -> Self {
		Self {
			retries: 3,
			retryable_status_codes: Self::DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
			retry_delay: RetryDelay::Fixed(StdDuration::from_millis(1_000)),
			max_retry_after: StdDuration::from_secs(60),
		}
	}
}

fn retry_after_hint(error: &Error) -> Option<StdDuration> {
	match error {
		Error::Transient(transient) =>
			transient.retry_after().and_then(|hint| StdDuration::try_from(hint).ok()),
		_ => None,
	}
}

/// [`PreAuthedFetch`] that retries transient failures.
pub struct FetchWithRetry<C>
where
	C: ?Sized + TokenHttpClient,
{
	fetch: PreAuthedFetch<C>,
	options: FetchRetryOptions,
	policy: RetryPolicy<Error>,
}
impl<C> FetchWithRetry<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Retry settings in use.
	pub fn options(&self) -> &FetchRetryOptions {
		&self.options
	}

	/// Sends `request`, retrying as configured.
	///
	/// Each attempt obtains a bearer token again. Responses with a retryable status count as
	/// [`TransientError::HttpStatus`] failures, and their `Retry-After` hint can lengthen the
	/// wait (see [`FetchRetryOptions::max_retry_after`]). Once retries are exhausted the last
	/// such error is returned instead of the response.
	pub async fn fetch(&self, request: FetchRequest) -> Result<Response> {
		let retryable_statuses = self.options.retryable_status_codes.as_slice();
		let attempt = |request: FetchRequest| async move {
			let response = self.fetch.fetch(request).await?;
			let status = response.status().as_u16();

			if retryable_statuses.contains(&status) {
				return Err(Error::from(TransientError::HttpStatus {
					status,
					retry_after: http::parse_retry_after(response.headers()),
				}));
			}

			Ok::<_, Error>(response)
		};

		Retryable::new(attempt, self.policy.clone()).call(request).await
	}
}
impl<C> Clone for FetchWithRetry<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn clone(&self) -> Self {
		Self { fetch: self.fetch.clone(), options: self.options.clone(), policy: self.policy.clone() }
	}
}
impl<C> Debug for FetchWithRetry<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FetchWithRetry")
			.field("fetch", &self.fetch)
			.field("options", &self.options)
			.finish_non_exhaustive()
	}
}

/// Composes `fetch` with a retry wrapper configured by `options`.
pub fn make_fetch_with_retry<C>(fetch: PreAuthedFetch<C>, options: FetchRetryOptions) -> FetchWithRetry<C>
where
	C: ?Sized + TokenHttpClient,
{
	let policy = options.policy();

	FetchWithRetry { fetch, options, policy }
}
