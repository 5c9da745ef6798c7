//! Storage contracts and built-in stores for the single token record a client holds.
//!
//! One store backs one provider account. The client reads through the synchronous
//! accessors on every state evaluation and writes through [`TokenStore::save`] after
//! each successful exchange or refresh; it never opens or manages storage itself.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret},
};

/// Boxed future returned by store mutations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend holding at most one token record.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Snapshot of the held record, if any.
	fn current(&self) -> Option<TokenRecord>;

	/// Replaces the held record wholesale.
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()>;

	/// Forgets the held record.
	fn clear(&self) -> StoreFuture<'_, ()>;

	/// Held access token.
	fn access_token(&self) -> Option<TokenSecret> {
		self.current().map(|record| record.access_token)
	}

	/// Held refresh token.
	fn refresh_token(&self) -> Option<TokenSecret> {
		self.current().and_then(|record| record.refresh_token)
	}

	/// Absolute expiry of the held access token.
	fn expiry_date(&self) -> Option<OffsetDateTime> {
		self.current().and_then(|record| record.expiry_date)
	}
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
