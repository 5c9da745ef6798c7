//! File-backed [`TokenStore`] keeping one JSON snapshot per provider account.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenRecord},
	store::{StoreError, StoreFuture, TokenStore},
};

/// Persists the token record to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Option<TokenRecord>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading an existing snapshot.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let snapshot = load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Opens the store for `provider` inside `dir`, i.e. `<dir>/<provider>.json`.
	pub fn for_provider(dir: impl AsRef<Path>, provider: &ProviderId) -> Result<Self, StoreError> {
		Self::open(dir.as_ref().join(format!("{provider}.json")))
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn persist(&self, snapshot: Option<&TokenRecord>) -> Result<(), StoreError> {
		let Some(record) = snapshot else {
			return match fs::remove_file(&self.path) {
				Ok(()) => Ok(()),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
				Err(e) => Err(StoreError::Backend {
					message: format!("Failed to remove {}: {e}", self.path.display()),
				}),
			};
		};

		ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(record).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize token snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenStore for FileStore {
	fn current(&self) -> Option<TokenRecord> {
		self.inner.read().clone()
	}

	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		let mut guard = self.inner.write();
		let result = self.persist(Some(&record));

		if result.is_ok() {
			*guard = Some(record);
		}

		drop(guard);

		Box::pin(async move { result })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let mut guard = self.inner.write();
		let result = self.persist(None);

		if result.is_ok() {
			guard.take();
		}

		drop(guard);

		Box::pin(async move { result })
	}
}

fn load_snapshot(path: &Path) -> Result<Option<TokenRecord>, StoreError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) =>
			return Err(StoreError::Backend {
				message: format!("Failed to read {}: {e}", path.display()),
			}),
	};

	if bytes.is_empty() {
		return Ok(None);
	}

	serde_json::from_slice(&bytes).map(Some).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_dir() -> PathBuf {
		env::temp_dir().join(format!(
			"photo_courier_file_store_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		))
	}

	#[tokio::test]
	async fn save_survives_reopen() {
		let dir = temp_dir();
		let provider = ProviderId::new("google").expect("Provider fixture should be valid.");
		let store = FileStore::for_provider(&dir, &provider).expect("Failed to open file store.");
		let record = TokenRecord::new("access-token")
			.with_refresh_token("refresh-token")
			.expiring_at(OffsetDateTime::UNIX_EPOCH + Duration::days(20_000));

		assert!(store.current().is_none());
		assert_eq!(store.path(), dir.join("google.json").as_path());

		store.save(record.clone()).await.expect("Failed to save fixture record.");
		drop(store);

		let reopened =
			FileStore::for_provider(&dir, &provider).expect("Failed to reopen file store.");

		assert_eq!(reopened.current(), Some(record));

		reopened.clear().await.expect("Failed to clear file store.");

		assert!(reopened.current().is_none());
		assert!(!dir.join("google.json").exists());

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store directory {}: {e}", dir.display())
		});
	}

	#[test]
	fn corrupt_snapshot_is_reported() {
		let dir = temp_dir();
		let path = dir.join("broken.json");

		fs::create_dir_all(&dir).expect("Failed to create temporary directory.");
		fs::write(&path, b"{not json").expect("Failed to write corrupt snapshot.");

		assert!(matches!(FileStore::open(&path), Err(StoreError::Serialization { .. })));

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store directory {}: {e}", dir.display())
		});
	}
}
