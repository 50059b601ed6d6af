//! Refresh credentials bound to an account and authority.

// self
use crate::{
	_prelude::*,
	auth::{HomeAccountId, TokenSecret},
	authority::Authority,
};

/// Long-lived credential used by silent acquisition.
///
/// One credential exists per (account, authority) pair. Silent acquisition rotates it by
/// compare-and-swap and marks it revoked once the authority demands interaction.
#[derive(Clone, Serialize, Deserialize)]
pub struct RefreshCredential {
	/// Account the credential belongs to.
	pub account: HomeAccountId,
	/// Authority that issued the credential.
	pub authority: Authority,
	/// Refresh token secret; callers must avoid logging it.
	pub secret: TokenSecret,
	/// Instant the credential was stored.
	pub issued_at: OffsetDateTime,
	/// Revocation instant once the authority rejected the credential.
	pub revoked_at: Option<OffsetDateTime>,
}
impl RefreshCredential {
	/// Creates an active credential stamped with the current clock.
	pub fn new(account: HomeAccountId, authority: Authority, secret: impl Into<String>) -> Self {
		Self {
			account,
			authority,
			secret: TokenSecret::new(secret),
			issued_at: OffsetDateTime::now_utc(),
			revoked_at: None,
		}
	}

	/// Returns `true` once the credential has been revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Marks the credential as revoked.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.revoked_at = Some(instant);
	}
}
impl Debug for RefreshCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCredential")
			.field("account", &self.account)
			.field("authority", &self.authority)
			.field("secret", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("revoked_at", &self.revoked_at)
			.finish()
	}
}
