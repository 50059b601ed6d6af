//! Access token records keyed by account, authority, and scopes.

// self
use crate::{
	_prelude::*,
	auth::{HomeAccountId, ScopeSet, token::secret::TokenSecret},
	authority::Authority,
};

/// Reasons a [`TokenRecordBuilder`] refuses to build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// No access token was supplied.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Neither `expires_at` nor `expires_in` was supplied.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Access token issued for an (account, authority, scopes) triple.
///
/// The account is referenced by identifier only; the account itself is owned by the
/// [`AccountStore`](crate::cache::AccountStore).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Account the token was issued to.
	pub account: HomeAccountId,
	/// Authority that issued the token.
	pub authority: Authority,
	/// Normalized scopes covered by this record (reserved OIDC scopes excluded).
	pub scope: ScopeSet,
	/// Bearer value; redacted in `Debug`.
	pub access_token: TokenSecret,
	/// Raw ID token returned alongside the access token, if any.
	pub id_token: Option<TokenSecret>,
	/// When the token response arrived.
	pub issued_at: OffsetDateTime,
	/// First instant at which the record is no longer served from the cache.
	pub expires_at: OffsetDateTime,
}
impl TokenRecord {
	/// Starts a builder for the provided account, authority, and scopes.
	pub fn builder(
		account: HomeAccountId,
		authority: Authority,
		scope: ScopeSet,
	) -> TokenRecordBuilder {
		TokenRecordBuilder {
			account,
			authority,
			scope,
			access_token: None,
			id_token: None,
			issued_at: None,
			expiry: None,
		}
	}

	/// Whether the record is expired at `now` (`expires_at <= now`).
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at <= now
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("account", &self.account)
			.field("authority", &self.authority)
			.field("scope", &self.scope)
			.field("access_token", &"<redacted>")
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[derive(Clone, Copy, Debug)]
enum Expiry {
	At(OffsetDateTime),
	In(Duration),
}

/// Builder for [`TokenRecord`]; the last expiry setter wins.
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	account: HomeAccountId,
	authority: Authority,
	scope: ScopeSet,
	access_token: Option<TokenSecret>,
	id_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expiry: Option<Expiry>,
}
impl TokenRecordBuilder {
	/// Overrides the issued-at instant (defaults to the build instant).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Absolute expiry.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expiry = Some(Expiry::At(instant));

		self
	}

	/// Expiry relative to the issued-at instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expiry = Some(Expiry::In(duration));

		self
	}

	/// Access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Raw ID token.
	pub fn id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(token));

		self
	}

	/// Validates and produces the record.
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match self.expiry.ok_or(TokenRecordBuilderError::MissingExpiry)? {
			Expiry::At(instant) => instant,
			Expiry::In(delta) => issued_at + delta,
		};

		Ok(TokenRecord {
			account: self.account,
			authority: self.authority,
			scope: self.scope,
			access_token,
			id_token: self.id_token,
			issued_at,
			expires_at,
		})
	}
}
