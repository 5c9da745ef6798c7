//! Thread-safe in-memory [`TokenStore`] for tests and short-lived sessions.

// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	store::{StoreFuture, TokenStore},
};

/// Keeps the token record in-process; it is lost when the process exits.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Option<TokenRecord>>>);
impl MemoryStore {
	/// Creates a store that already holds `record`.
	pub fn with_record(record: TokenRecord) -> Self {
		Self(Arc::new(RwLock::new(Some(record))))
	}
}
impl TokenStore for MemoryStore {
	fn current(&self) -> Option<TokenRecord> {
		self.0.read().clone()
	}

	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		*self.0.write() = Some(record);

		Box::pin(async { Ok(()) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		self.0.write().take();

		Box::pin(async { Ok(()) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn save_replaces_record_wholesale() {
		let store = MemoryStore::with_record(TokenRecord::new("first").with_refresh_token("r1"));

		store.save(TokenRecord::new("second")).await.expect("Memory saves should not fail.");

		let held = store.current().expect("Saved record should be held.");

		assert_eq!(held.access_token.expose(), "second");
		assert!(held.refresh_token.is_none(), "Saving must not merge the previous record.");
	}

	#[tokio::test]
	async fn clones_share_state_and_clear_forgets() {
		let store = MemoryStore::default();
		let view = store.clone();

		store.save(TokenRecord::new("shared")).await.expect("Memory saves should not fail.");

		assert_eq!(view.access_token().map(|t| t.expose().to_owned()), Some("shared".into()));

		view.clear().await.expect("Memory clears should not fail.");

		assert!(store.current().is_none());
	}
}
