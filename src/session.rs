//! UI-owned session value holding the most recent acquisition result.

// self
use crate::{
	_prelude::*,
	auth::{Account, HomeAccountId, TokenRecord, TokenSecret},
};

/// Current signed-in account and token, kept by the caller between engine calls.
///
/// Nothing here is persisted; the engine never reads it.
#[derive(Clone, Debug, Default)]
pub struct Session {
	account: Option<Account>,
	record: Option<TokenRecord>,
}
impl Session {
	/// Records the outcome of a successful acquisition.
	pub fn apply(&mut self, account: Account, record: TokenRecord) {
		self.account = Some(account);
		self.record = Some(record);
	}

	/// Replaces the token while keeping the account, typically after a silent refresh.
	///
	/// Ignored when the record belongs to a different account.
	pub fn refresh(&mut self, record: TokenRecord) {
		if self.account.as_ref().is_some_and(|a| a.home_account_id == record.account) {
			self.record = Some(record);
		}
	}

	/// Forgets everything, typically after sign-out.
	pub fn clear(&mut self) {
		self.account = None;
		self.record = None;
	}

	/// Signed-in account, if any.
	pub fn account(&self) -> Option<&Account> {
		self.account.as_ref()
	}

	/// Home account id of the signed-in account, if any.
	pub fn home_account_id(&self) -> Option<&HomeAccountId> {
		self.account.as_ref().map(|a| &a.home_account_id)
	}

	/// Most recent token record, if any.
	pub fn record(&self) -> Option<&TokenRecord> {
		self.record.as_ref()
	}

	/// Access token of the most recent record while it is still valid.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access_token_at(OffsetDateTime::now_utc())
	}

	/// [`access_token`](Self::access_token) against a caller-provided clock.
	pub fn access_token_at(&self, now: OffsetDateTime) -> Option<&TokenSecret> {
		self.record.as_ref().filter(|r| !r.is_expired_at(now)).map(|r| &r.access_token)
	}

	/// Returns `true` when an account is set.
	pub fn is_signed_in(&self) -> bool {
		self.account.is_some()
	}
}
