// std
use std::future::IntoFuture;
// self
use crate::_prelude::*;

/// Boxed future carrying the remainder of a synchronous call that went asynchronous.
pub type PendingOutcome<'a, T, E> = Pin<Box<dyn 'a + Send + Future<Output = Result<T, E>>>>;

/// Result of a [`SyncRetryable`](super::SyncRetryable) call.
pub enum Outcome<'a, T, E> {
	/// The call settled synchronously.
	Ready(Result<T, E>),
	/// A retry decision was pending; the call settles when this future resolves.
	Pending(PendingOutcome<'a, T, E>),
}
impl<T, E> Outcome<'_, T, E> {
	/// Returns `true` if the call settled synchronously.
	pub fn is_ready(&self) -> bool {
		matches!(self, Self::Ready(_))
	}

	/// Returns the settled result, or `None` if the call is still pending.
	pub fn ready(self) -> Option<Result<T, E>> {
		match self {
			Self::Ready(result) => Some(result),
			Self::Pending(_) => None,
		}
	}
}
impl<'a, T, E> IntoFuture for Outcome<'a, T, E>
where
	T: 'a + Send,
	E: 'a + Send,
{
	type IntoFuture = PendingOutcome<'a, T, E>;
	type Output = Result<T, E>;

	fn into_future(self) -> Self::IntoFuture {
		match self {
			Self::Ready(result) => Box::pin(async move { result }),
			Self::Pending(pending) => pending,
		}
	}
}
impl<T, E> Debug for Outcome<'_, T, E>
where
	T: Debug,
	E: Debug,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Ready(result) => f.debug_tuple("Outcome::Ready").field(result).finish(),
			Self::Pending(_) => f.write_str("Outcome::Pending(..)"),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn ready_outcomes_await_to_their_result() {
		let outcome = <Outcome<'_, u8, ()>>::Ready(Ok(7));

		assert!(outcome.is_ready());
		assert_eq!(outcome.await, Ok(7));
	}

	#[tokio::test]
	async fn pending_outcomes_are_not_ready() {
		let outcome = <Outcome<'_, u8, ()>>::Pending(Box::pin(async { Err(()) }));

		assert!(!outcome.is_ready());
		assert_eq!(outcome.await, Err(()));
	}
}
