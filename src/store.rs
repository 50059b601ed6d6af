//! Storage contracts and built-in backends for accounts, token records, and refresh
//! credentials.

pub mod file;
pub mod memory;

mod state;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use state::CacheSnapshot;

// self
use crate::{
	_prelude::*,
	auth::{Account, HomeAccountId, RefreshCredential, ScopeSet, TokenRecord},
	authority::Authority,
};

/// Boxed future returned by [`CacheStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract shared by the account store and the token cache.
///
/// Accounts keep insertion order. Removing an account cascades to its token records and
/// refresh credentials atomically.
pub trait CacheStore
where
	Self: Send + Sync,
{
	/// Inserts or replaces an account by home account id, keeping its original position.
	fn save_account(&self, account: Account) -> StoreFuture<'_, ()>;

	/// Lists accounts in insertion order.
	fn accounts(&self) -> StoreFuture<'_, Vec<Account>>;

	/// Removes an account together with its tokens and refresh credentials.
	fn remove_account<'a>(&'a self, account: &'a HomeAccountId)
	-> StoreFuture<'a, Option<Account>>;

	/// Persists or replaces the token record for its (account, authority, scopes) key.
	///
	/// Returns `false` without writing when the owning account is absent. The check and the
	/// write happen under the same lock as [`remove_account`](Self::remove_account), so a
	/// write racing a removal never outlives it.
	fn save_token(&self, record: TokenRecord) -> StoreFuture<'_, bool>;

	/// Returns every token record held for the account under the authority.
	fn tokens<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
	) -> StoreFuture<'a, Vec<TokenRecord>>;

	/// Drops all token records and refresh credentials of the account; returns the number of
	/// token records removed.
	fn evict_tokens<'a>(&'a self, account: &'a HomeAccountId) -> StoreFuture<'a, usize>;

	/// Persists or replaces the refresh credential for its (account, authority) key.
	///
	/// Same ownership rule as [`save_token`](Self::save_token).
	fn save_refresh(&self, credential: RefreshCredential) -> StoreFuture<'_, bool>;

	/// Fetches the refresh credential for the (account, authority) key.
	fn fetch_refresh<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
	) -> StoreFuture<'a, Option<RefreshCredential>>;

	/// Atomically rotates a refresh credential if the stored secret matches `expected`.
	fn compare_and_swap_refresh<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
		expected: &'a str,
		replacement: RefreshCredential,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Marks the refresh credential as revoked at the provided instant.
	fn revoke_refresh<'a>(
		&'a self,
		account: &'a HomeAccountId,
		authority: &'a Authority,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<RefreshCredential>>;
}

/// Result of a refresh-credential compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The stored secret matched the expected value and the credential was replaced.
	Updated,
	/// A credential exists but its secret did not match.
	RefreshMismatch,
	/// No credential exists for the key.
	Missing,
}

/// Error type produced by [`CacheStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Snapshot (de)serialization failed.
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

/// Key identifying a stored token record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenKey {
	/// Account component.
	pub account: HomeAccountId,
	/// Authority component.
	pub authority: Authority,
	/// Scope fingerprint used for partitioning.
	pub scope_fingerprint: String,
}
impl TokenKey {
	/// Builds a key from its parts.
	pub fn new(account: &HomeAccountId, authority: &Authority, scope: &ScopeSet) -> Self {
		Self {
			account: account.clone(),
			authority: authority.clone(),
			scope_fingerprint: scope.fingerprint(),
		}
	}

	/// Key of an existing record.
	pub fn of(record: &TokenRecord) -> Self {
		Self::new(&record.account, &record.authority, &record.scope)
	}
}

/// Key identifying a refresh credential (and an in-flight acquisition).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
	/// Account component.
	pub account: HomeAccountId,
	/// Authority component.
	pub authority: Authority,
}
impl CredentialKey {
	/// Builds a key from its parts.
	pub fn new(account: &HomeAccountId, authority: &Authority) -> Self {
		Self { account: account.clone(), authority: authority.clone() }
	}
}
