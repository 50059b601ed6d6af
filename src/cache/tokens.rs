//! Token records keyed by (account, authority, scopes) plus refresh credentials.

// std
use std::cmp::Reverse;
// self
use crate::{
	_prelude::*,
	auth::{HomeAccountId, RefreshCredential, ScopeSet, TokenRecord},
	authority::Authority,
	store::{CacheStore, CompareAndSwapOutcome},
};

/// Cache of issued access tokens and refresh credentials.
///
/// Expired records are never returned.
#[derive(Clone)]
pub struct TokenCache {
	store: Arc<dyn CacheStore>,
}
impl TokenCache {
	/// Creates a view over the provided backend.
	pub fn new(store: Arc<dyn CacheStore>) -> Self {
		Self { store }
	}

	/// Returns an unexpired record covering `scopes` for the account under the authority.
	pub async fn lookup(
		&self,
		account: &HomeAccountId,
		authority: &Authority,
		scopes: &ScopeSet,
	) -> Result<Option<TokenRecord>> {
		self.lookup_at(account, authority, scopes, OffsetDateTime::now_utc()).await
	}

	/// [`lookup`](Self::lookup) against a caller-provided clock.
	///
	/// Reserved OpenID Connect scopes in the request are ignored. A record whose scopes equal
	/// the request wins over wider records; among wider records the narrowest, then the
	/// longest-lived, is returned.
	pub async fn lookup_at(
		&self,
		account: &HomeAccountId,
		authority: &Authority,
		scopes: &ScopeSet,
		now: OffsetDateTime,
	) -> Result<Option<TokenRecord>> {
		let wanted = scopes.without_reserved();
		let candidates = self
			.store
			.tokens(account, authority)
			.await?
			.into_iter()
			.filter(|r| r.expires_at > now && r.scope.is_superset_of(&wanted))
			.collect::<Vec<_>>();

		if let Some(exact) = candidates.iter().find(|r| wanted.is_superset_of(&r.scope)) {
			return Ok(Some(exact.clone()));
		}

		Ok(candidates.into_iter().min_by_key(|r| (r.scope.len(), Reverse(r.expires_at))))
	}

	/// Stores a record, replacing any record under the same key.
	///
	/// Fails with [`Error::AccountNotFound`] and writes nothing when the account is not in the
	/// account store, e.g. because it signed out while the token was being acquired.
	pub async fn store(&self, record: TokenRecord) -> Result<()> {
		let account = record.account.clone();

		if self.store.save_token(record).await? {
			Ok(())
		} else {
			Err(Error::AccountNotFound { account })
		}
	}

	/// Drops every record and refresh credential of the account.
	pub async fn evict(&self, account: &HomeAccountId) -> Result<usize> {
		Ok(self.store.evict_tokens(account).await?)
	}

	/// Current refresh credential for the (account, authority) pair.
	pub async fn refresh_credential(
		&self,
		account: &HomeAccountId,
		authority: &Authority,
	) -> Result<Option<RefreshCredential>> {
		Ok(self.store.fetch_refresh(account, authority).await?)
	}

	/// Stores a refresh credential, replacing the current one.
	///
	/// Same account rule as [`store`](Self::store).
	pub async fn store_refresh_credential(&self, credential: RefreshCredential) -> Result<()> {
		let account = credential.account.clone();

		if self.store.save_refresh(credential).await? {
			Ok(())
		} else {
			Err(Error::AccountNotFound { account })
		}
	}

	/// Replaces the credential only if its secret still equals `expected`.
	pub async fn rotate_refresh_credential(
		&self,
		expected: &RefreshCredential,
		replacement: RefreshCredential,
	) -> Result<CompareAndSwapOutcome> {
		Ok(self
			.store
			.compare_and_swap_refresh(
				&expected.account,
				&expected.authority,
				expected.secret.expose(),
				replacement,
			)
			.await?)
	}

	/// Marks the credential revoked; later silent attempts require interaction.
	pub async fn revoke_refresh_credential(
		&self,
		account: &HomeAccountId,
		authority: &Authority,
	) -> Result<Option<RefreshCredential>> {
		Ok(self.store.revoke_refresh(account, authority, OffsetDateTime::now_utc()).await?)
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{auth::Account, store::MemoryStore};

	const NOW: OffsetDateTime = macros::datetime!(2025-01-01 12:00 UTC);

	fn id() -> HomeAccountId {
		HomeAccountId::new("uid.utid").expect("Account fixture should be valid.")
	}

	fn authority() -> Authority {
		Authority::b2c("contoso.b2clogin.com", "contoso.onmicrosoft.com", "b2c_1_susi")
			.expect("Authority fixture should be valid.")
	}

	fn record(scopes: &[&str], access: &str, expires_at: OffsetDateTime) -> TokenRecord {
		TokenRecord::builder(
			id(),
			authority(),
			ScopeSet::new(scopes.iter().copied()).expect("Scope fixture should be valid."),
		)
		.access_token(access)
		.issued_at(NOW - Duration::minutes(5))
		.expires_at(expires_at)
		.build()
		.expect("Record fixture should build.")
	}

	async fn cache_with_account() -> TokenCache {
		let store = Arc::new(MemoryStore::default());

		store.save_account(Account::new(id())).await.expect("Seeding the account should succeed.");

		TokenCache::new(store)
	}

	fn scopes(values: &[&str]) -> ScopeSet {
		ScopeSet::new(values.iter().copied()).expect("Scope fixture should be valid.")
	}

	#[tokio::test]
	async fn exact_scope_match_is_preferred() {
		let cache = cache_with_account().await;

		cache
			.store(record(&["read", "write"], "wide", NOW + Duration::hours(2)))
			.await
			.expect("Store should succeed.");
		cache
			.store(record(&["read"], "exact", NOW + Duration::hours(1)))
			.await
			.expect("Store should succeed.");

		let hit = cache
			.lookup_at(&id(), &authority(), &scopes(&["read", "openid"]), NOW)
			.await
			.expect("Lookup should succeed.")
			.expect("A record should cover the request.");

		assert_eq!(hit.access_token.expose(), "exact");

		let wide = cache
			.lookup_at(&id(), &authority(), &scopes(&["write"]), NOW)
			.await
			.expect("Lookup should succeed.")
			.expect("The wider record should cover the request.");

		assert_eq!(wide.access_token.expose(), "wide");
	}

	#[tokio::test]
	async fn expired_records_are_never_returned() {
		let cache = cache_with_account().await;

		cache.store(record(&["read"], "stale", NOW)).await.expect("Store should succeed.");

		assert!(
			cache
				.lookup_at(&id(), &authority(), &scopes(&["read"]), NOW)
				.await
				.expect("Lookup should succeed.")
				.is_none()
		);
		assert!(
			cache
				.lookup_at(&id(), &authority(), &scopes(&["read"]), NOW - Duration::seconds(1))
				.await
				.expect("Lookup should succeed.")
				.is_some()
		);
	}

	#[tokio::test]
	async fn other_authorities_do_not_match() {
		let cache = cache_with_account().await;
		let edit = Authority::b2c("contoso.b2clogin.com", "contoso.onmicrosoft.com", "b2c_1_edit")
			.expect("Authority fixture should be valid.");

		cache
			.store(record(&["read"], "susi", NOW + Duration::hours(1)))
			.await
			.expect("Store should succeed.");

		assert!(
			cache
				.lookup_at(&id(), &edit, &scopes(&["read"]), NOW)
				.await
				.expect("Lookup should succeed.")
				.is_none()
		);
	}

	#[tokio::test]
	async fn refresh_credentials_rotate_and_revoke() {
		let cache = cache_with_account().await;
		let current = RefreshCredential::new(id(), authority(), "r1");

		cache.store_refresh_credential(current.clone()).await.expect("Store should succeed.");

		let outcome = cache
			.rotate_refresh_credential(&current, RefreshCredential::new(id(), authority(), "r2"))
			.await
			.expect("Rotation should succeed.");

		assert_eq!(outcome, CompareAndSwapOutcome::Updated);

		let stale = cache
			.rotate_refresh_credential(&current, RefreshCredential::new(id(), authority(), "r3"))
			.await
			.expect("Rotation should complete.");

		assert_eq!(stale, CompareAndSwapOutcome::RefreshMismatch);

		let revoked = cache
			.revoke_refresh_credential(&id(), &authority())
			.await
			.expect("Revocation should succeed.")
			.expect("A credential should exist.");

		assert!(revoked.is_revoked());
		assert_eq!(revoked.secret.expose(), "r2");
	}

	#[tokio::test]
	async fn writes_for_unknown_accounts_are_rejected() {
		let cache = TokenCache::new(Arc::new(MemoryStore::default()));
		let err = cache
			.store(record(&["read"], "orphan", NOW + Duration::hours(1)))
			.await
			.expect_err("A record without an account must be rejected.");

		assert!(matches!(err, Error::AccountNotFound { ref account } if *account == id()));

		let err = cache
			.store_refresh_credential(RefreshCredential::new(id(), authority(), "orphan"))
			.await
			.expect_err("A credential without an account must be rejected.");

		assert!(matches!(err, Error::AccountNotFound { .. }));
		assert!(
			cache
				.lookup_at(&id(), &authority(), &scopes(&["read"]), NOW)
				.await
				.expect("Lookup should succeed.")
				.is_none()
		);
		assert!(
			cache
				.refresh_credential(&id(), &authority())
				.await
				.expect("Fetch should succeed.")
				.is_none()
		);
	}
}
