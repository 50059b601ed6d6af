//! File-backed [`CacheStore`] that persists a JSON snapshot after each mutation.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{Account, HomeAccountId, RefreshCredential, TokenRecord},
	authority::Authority,
	store::{
		CacheSnapshot, CacheStore, CompareAndSwapOutcome, StoreError, StoreFuture,
		state::CacheState,
	},
};

/// Persists accounts, token records, and refresh credentials to a JSON file.
///
/// Writes go to a sibling `.tmp` file that is synced and then renamed over the snapshot.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<CacheState>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(CacheState::from_snapshot(snapshot))) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<CacheSnapshot, StoreError> {
		if !path.exists() {
			return Ok(CacheSnapshot::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(CacheSnapshot::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
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

	fn persist_locked(&self, state: &CacheState) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(&state.snapshot()).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
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

	fn mutate<T>(&self, f: impl FnOnce(&mut CacheState) -> T) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let out = f(&mut guard);

		self.persist_locked(&guard)?;

		Ok(out)
	}
}
impl CacheStore for FileStore {
	fn save_account(&self, account: Account) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.mutate(|state| state.upsert_account(account)) })
	}

	fn accounts(&self) -> StoreFuture<'_, Vec<Account>> {
		Box::pin(async move { Ok(self.inner.read().accounts()) })
	}

	fn remove_account<'a>(
		&'a self,
		account: &'a HomeAccountId,
	) -> StoreFuture<'a, Option<Account>> {
		Box::pin(async move { self.mutate(|state| state.remove_account(account)) })
	}

	fn save_token(&self, record: TokenRecord) -> StoreFuture<'_, bool> {
		Box::pin(async move { self.mutate(|state| state.save_token(record)) })
	}

	fn tokens<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
	) -> StoreFuture<'a, Vec<TokenRecord>> {
		Box::pin(async move { Ok(self.inner.read().tokens(account, authority)) })
	}

	fn evict_tokens<'a>(&'a self, account: &'a HomeAccountId) -> StoreFuture<'a, usize> {
		Box::pin(async move { self.mutate(|state| state.evict_tokens(account)) })
	}

	fn save_refresh(&self, credential: RefreshCredential) -> StoreFuture<'_, bool> {
		Box::pin(async move { self.mutate(|state| state.save_refresh(credential)) })
	}

	fn fetch_refresh<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
	) -> StoreFuture<'a, Option<RefreshCredential>> {
		Box::pin(async move { Ok(self.inner.read().refresh(account, authority)) })
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
		expected: &'a str,
		replacement: RefreshCredential,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			self.mutate(|state| {
				state.compare_and_swap_refresh(account, authority, expected, replacement)
			})
		})
	}

	fn revoke_refresh<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<RefreshCredential>> {
		Box::pin(async move { self.mutate(|state| state.revoke_refresh(account, authority, instant)) })
	}
}
