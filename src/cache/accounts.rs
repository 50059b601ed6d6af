//! Ordered registry of signed-in accounts.

// self
use crate::{
	_prelude::*,
	auth::{Account, HomeAccountId},
	store::CacheStore,
};

/// Accounts known to the client, in the order they first signed in.
#[derive(Clone)]
pub struct AccountStore {
	store: Arc<dyn CacheStore>,
}
impl AccountStore {
	/// Creates a view over the provided backend.
	pub fn new(store: Arc<dyn CacheStore>) -> Self {
		Self { store }
	}

	/// All known accounts in insertion order.
	pub async fn list(&self) -> Result<Vec<Account>> {
		Ok(self.store.accounts().await?)
	}

	/// Looks up an account by its home account id.
	pub async fn get(&self, id: &HomeAccountId) -> Result<Option<Account>> {
		Ok(self.list().await?.into_iter().find(|a| &a.home_account_id == id))
	}

	/// First account (in insertion order) whose object id ends with `policy`,
	/// compared case-insensitively.
	pub async fn find_by_policy(&self, policy: &str) -> Result<Option<Account>> {
		Ok(self.list().await?.into_iter().find(|a| a.matches_policy(policy)))
	}

	/// Inserts or replaces an account, keeping its original position.
	pub async fn upsert(&self, account: Account) -> Result<()> {
		Ok(self.store.save_account(account).await?)
	}

	/// Removes an account together with its token records and refresh credentials.
	pub async fn remove(&self, id: &HomeAccountId) -> Result<Account> {
		self.store
			.remove_account(id)
			.await?
			.ok_or_else(|| Error::AccountNotFound { account: id.clone() })
	}
}
impl Debug for AccountStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccountStore").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	fn account(raw: &str) -> Account {
		Account::new(HomeAccountId::new(raw).expect("Account fixture should be valid."))
	}

	#[tokio::test]
	async fn find_by_policy_returns_first_match_in_order() {
		let accounts = AccountStore::new(Arc::new(MemoryStore::default()));
		let aad = account("90c0fe63-bcf2-44d5-8fb7-b8bbc0b29dc6.72f988bf");
		let first = account("11111111-2222-3333-4444-555555555555-b2c_1_susi.775527ff");
		let second = account("66666666-7777-8888-9999-000000000000-b2c_1_susi.775527ff");

		for a in [aad.clone(), first.clone(), second] {
			accounts.upsert(a).await.expect("Upsert should succeed.");
		}

		assert_eq!(
			accounts.find_by_policy("B2C_1_SUSI").await.expect("Lookup should succeed."),
			Some(first)
		);
		assert_eq!(
			accounts.find_by_policy("b2c_1_edit_profile").await.expect("Lookup should succeed."),
			None
		);
		assert_eq!(
			accounts.get(&aad.home_account_id).await.expect("Lookup should succeed."),
			Some(aad)
		);
	}

	#[tokio::test]
	async fn removing_unknown_account_fails() {
		let accounts = AccountStore::new(Arc::new(MemoryStore::default()));
		let id = HomeAccountId::new("missing.t").expect("Account fixture should be valid.");
		let err = accounts.remove(&id).await.expect_err("Removal of an unknown account must fail.");

		assert!(matches!(err, Error::AccountNotFound { account } if account == id));
	}
}
