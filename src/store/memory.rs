//! Thread-safe in-memory [`CacheStore`] whose contents live for the process lifetime.

// self
use crate::{
	_prelude::*,
	auth::{Account, HomeAccountId, RefreshCredential, TokenRecord},
	authority::Authority,
	store::{CacheSnapshot, CacheStore, CompareAndSwapOutcome, StoreFuture, state::CacheState},
};

/// Storage backend that keeps accounts and tokens in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<CacheState>>);
impl MemoryStore {
	/// Seeds a store from a previously captured snapshot.
	pub fn from_snapshot(snapshot: CacheSnapshot) -> Self {
		Self(Arc::new(RwLock::new(CacheState::from_snapshot(snapshot))))
	}

	/// Captures the current contents.
	pub fn snapshot(&self) -> CacheSnapshot {
		self.0.read().snapshot()
	}
}
impl CacheStore for MemoryStore {
	fn save_account(&self, account: Account) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.0.write().upsert_account(account);

			Ok(())
		})
	}

	fn accounts(&self) -> StoreFuture<'_, Vec<Account>> {
		Box::pin(async move { Ok(self.0.read().accounts()) })
	}

	fn remove_account<'a>(
		&'a self,
		account: &'a HomeAccountId,
	) -> StoreFuture<'a, Option<Account>> {
		Box::pin(async move { Ok(self.0.write().remove_account(account)) })
	}

	fn save_token(&self, record: TokenRecord) -> StoreFuture<'_, bool> {
		Box::pin(async move { Ok(self.0.write().save_token(record)) })
	}

	fn tokens<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
	) -> StoreFuture<'a, Vec<TokenRecord>> {
		Box::pin(async move { Ok(self.0.read().tokens(account, authority)) })
	}

	fn evict_tokens<'a>(&'a self, account: &'a HomeAccountId) -> StoreFuture<'a, usize> {
		Box::pin(async move { Ok(self.0.write().evict_tokens(account)) })
	}

	fn save_refresh(&self, credential: RefreshCredential) -> StoreFuture<'_, bool> {
		Box::pin(async move { Ok(self.0.write().save_refresh(credential)) })
	}

	fn fetch_refresh<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
	) -> StoreFuture<'a, Option<RefreshCredential>> {
		Box::pin(async move { Ok(self.0.read().refresh(account, authority)) })
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
		expected: &'a str,
		replacement: RefreshCredential,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			Ok(self.0.write().compare_and_swap_refresh(account, authority, expected, replacement))
		})
	}

	fn revoke_refresh<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<RefreshCredential>> {
		Box::pin(async move { Ok(self.0.write().revoke_refresh(account, authority, instant)) })
	}
}
