//! In-memory cache state shared by the built-in backends.

// self
use crate::{
	_prelude::*,
	auth::{Account, HomeAccountId, RefreshCredential, TokenRecord},
	authority::Authority,
	store::{CompareAndSwapOutcome, CredentialKey, TokenKey},
};

/// Serializable view of every account, token record, and refresh credential.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
	/// Accounts in insertion order.
	#[serde(default)]
	pub accounts: Vec<Account>,
	/// Token records.
	#[serde(default)]
	pub tokens: Vec<TokenRecord>,
	/// Refresh credentials.
	#[serde(default)]
	pub refresh_credentials: Vec<RefreshCredential>,
}

#[derive(Debug, Default)]
pub(crate) struct CacheState {
	accounts: Vec<Account>,
	tokens: HashMap<TokenKey, TokenRecord>,
	refresh: HashMap<CredentialKey, RefreshCredential>,
}
impl CacheState {
	pub(crate) fn from_snapshot(snapshot: CacheSnapshot) -> Self {
		let mut state = Self::default();

		for account in snapshot.accounts {
			state.upsert_account(account);
		}
		for record in snapshot.tokens {
			state.insert_token(record);
		}
		for credential in snapshot.refresh_credentials {
			state.insert_refresh(credential);
		}

		state
	}

	pub(crate) fn snapshot(&self) -> CacheSnapshot {
		CacheSnapshot {
			accounts: self.accounts.clone(),
			tokens: self.tokens.values().cloned().collect(),
			refresh_credentials: self.refresh.values().cloned().collect(),
		}
	}

	pub(crate) fn upsert_account(&mut self, account: Account) {
		match self.accounts.iter_mut().find(|a| a.home_account_id == account.home_account_id) {
			Some(slot) => *slot = account,
			None => self.accounts.push(account),
		}
	}

	pub(crate) fn accounts(&self) -> Vec<Account> {
		self.accounts.clone()
	}

	pub(crate) fn remove_account(&mut self, id: &HomeAccountId) -> Option<Account> {
		let position = self.accounts.iter().position(|a| &a.home_account_id == id)?;
		let removed = self.accounts.remove(position);

		self.evict_tokens(id);

		Some(removed)
	}

	pub(crate) fn has_account(&self, id: &HomeAccountId) -> bool {
		self.accounts.iter().any(|a| &a.home_account_id == id)
	}

	pub(crate) fn insert_token(&mut self, record: TokenRecord) {
		self.tokens.insert(TokenKey::of(&record), record);
	}

	/// Inserts the record only while its account is present; a removed account stays empty.
	pub(crate) fn save_token(&mut self, record: TokenRecord) -> bool {
		let owned = self.has_account(&record.account);

		if owned {
			self.insert_token(record);
		}

		owned
	}

	pub(crate) fn tokens(&self, account: &HomeAccountId, authority: &Authority) -> Vec<TokenRecord> {
		self.tokens
			.values()
			.filter(|r| &r.account == account && &r.authority == authority)
			.cloned()
			.collect()
	}

	pub(crate) fn evict_tokens(&mut self, account: &HomeAccountId) -> usize {
		let before = self.tokens.len();

		self.tokens.retain(|key, _| &key.account != account);
		self.refresh.retain(|key, _| &key.account != account);

		before - self.tokens.len()
	}

	pub(crate) fn insert_refresh(&mut self, credential: RefreshCredential) {
		let key = CredentialKey::new(&credential.account, &credential.authority);

		self.refresh.insert(key, credential);
	}

	/// Inserts the credential only while its account is present.
	pub(crate) fn save_refresh(&mut self, credential: RefreshCredential) -> bool {
		let owned = self.has_account(&credential.account);

		if owned {
			self.insert_refresh(credential);
		}

		owned
	}

	pub(crate) fn refresh(
		&self,
		account: &HomeAccountId,
		authority: &Authority,
	) -> Option<RefreshCredential> {
		self.refresh.get(&CredentialKey::new(account, authority)).cloned()
	}

	pub(crate) fn compare_and_swap_refresh(
		&mut self,
		account: &HomeAccountId,
		authority: &Authority,
		expected: &str,
		replacement: RefreshCredential,
	) -> CompareAndSwapOutcome {
		let key = CredentialKey::new(account, authority);
		let outcome = match self.refresh.get(&key) {
			Some(existing) if existing.secret.expose() == expected => CompareAndSwapOutcome::Updated,
			Some(_) => CompareAndSwapOutcome::RefreshMismatch,
			None => CompareAndSwapOutcome::Missing,
		};

		if matches!(outcome, CompareAndSwapOutcome::Updated) {
			self.refresh.insert(key, replacement);
		}

		outcome
	}

	pub(crate) fn revoke_refresh(
		&mut self,
		account: &HomeAccountId,
		authority: &Authority,
		instant: OffsetDateTime,
	) -> Option<RefreshCredential> {
		let credential = self.refresh.get_mut(&CredentialKey::new(account, authority))?;

		credential.revoke(instant);

		Some(credential.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::ScopeSet;

	fn account(raw: &str) -> Account {
		Account::new(HomeAccountId::new(raw).expect("Account fixture should be valid."))
	}

	fn authority() -> Authority {
		Authority::aad("login.microsoftonline.com", "common").expect("Authority should resolve.")
	}

	fn record(account: &Account, scope: &str) -> TokenRecord {
		TokenRecord::builder(
			account.home_account_id.clone(),
			authority(),
			ScopeSet::new([scope]).expect("Scope fixture should be valid."),
		)
		.access_token(format!("access-{scope}"))
		.expires_in(Duration::hours(1))
		.build()
		.expect("Record fixture should build.")
	}

	#[test]
	fn upsert_keeps_original_position() {
		let mut state = CacheState::default();
		let first = account("a.t");

		state.upsert_account(first.clone());
		state.upsert_account(account("b.t"));
		state.upsert_account(first.clone().with_username("renamed"));

		let accounts = state.accounts();

		assert_eq!(accounts.len(), 2);
		assert_eq!(accounts[0].username.as_deref(), Some("renamed"));
		assert_eq!(accounts[1].home_account_id.as_ref(), "b.t");
	}

	#[test]
	fn removing_an_account_cascades() {
		let mut state = CacheState::default();
		let kept = account("keep.t");
		let gone = account("gone.t");

		state.upsert_account(kept.clone());
		state.upsert_account(gone.clone());
		state.insert_token(record(&kept, "read"));
		state.insert_token(record(&gone, "read"));
		state.insert_token(record(&gone, "write"));
		state.insert_refresh(RefreshCredential::new(gone.home_account_id.clone(), authority(), "r"));

		assert!(state.remove_account(&gone.home_account_id).is_some());
		assert!(state.tokens(&gone.home_account_id, &authority()).is_empty());
		assert!(state.refresh(&gone.home_account_id, &authority()).is_none());
		assert_eq!(state.tokens(&kept.home_account_id, &authority()).len(), 1);
		assert!(state.remove_account(&gone.home_account_id).is_none());
	}

	#[test]
	fn writes_for_removed_accounts_are_dropped() {
		let mut state = CacheState::default();
		let gone = account("gone.t");
		let id = gone.home_account_id.clone();

		state.upsert_account(gone.clone());

		assert!(state.save_token(record(&gone, "read")));
		assert!(state.remove_account(&id).is_some());
		assert!(!state.save_token(record(&gone, "write")));
		assert!(!state.save_refresh(RefreshCredential::new(id.clone(), authority(), "late")));
		assert!(state.tokens(&id, &authority()).is_empty());
		assert!(state.refresh(&id, &authority()).is_none());
	}

	#[test]
	fn compare_and_swap_requires_matching_secret() {
		let mut state = CacheState::default();
		let id = account("a.t").home_account_id;

		assert_eq!(
			state.compare_and_swap_refresh(
				&id,
				&authority(),
				"r1",
				RefreshCredential::new(id.clone(), authority(), "r2"),
			),
			CompareAndSwapOutcome::Missing
		);

		state.insert_refresh(RefreshCredential::new(id.clone(), authority(), "r1"));

		assert_eq!(
			state.compare_and_swap_refresh(
				&id,
				&authority(),
				"stale",
				RefreshCredential::new(id.clone(), authority(), "r2"),
			),
			CompareAndSwapOutcome::RefreshMismatch
		);
		assert_eq!(
			state.compare_and_swap_refresh(
				&id,
				&authority(),
				"r1",
				RefreshCredential::new(id.clone(), authority(), "r2"),
			),
			CompareAndSwapOutcome::Updated
		);
		assert_eq!(
			state.refresh(&id, &authority()).map(|c| c.secret.expose().to_owned()),
			Some("r2".into())
		);
	}

	#[test]
	fn snapshot_round_trips_through_json() {
		let mut state = CacheState::default();
		let a = account("a.t");

		state.upsert_account(a.clone());
		state.insert_token(record(&a, "read"));

		let json = serde_json::to_string(&state.snapshot()).expect("Snapshot should serialize.");
		let restored = CacheState::from_snapshot(
			serde_json::from_str(&json).expect("Snapshot should deserialize."),
		);

		assert_eq!(restored.accounts(), vec![a.clone()]);
		assert_eq!(restored.tokens(&a.home_account_id, &authority()), state.tokens(&a.home_account_id, &authority()));
	}
}
