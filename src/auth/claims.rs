//! Identity payloads returned by the token endpoint (`client_info` and ID token claims).
//!
//! ID tokens are decoded for account metadata only; their signatures are not verified because
//! they arrive directly from the token endpoint over TLS.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{Account, HomeAccountId},
	error::AcquisitionError,
};

/// Decoded `client_info` payload (`{uid, utid}`).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ClientInfo {
	/// User object identifier.
	pub uid: String,
	/// Home tenant identifier.
	pub utid: String,
}
impl ClientInfo {
	/// Decodes the base64url JSON value returned by the token endpoint.
	pub fn decode(raw: &str) -> Result<Self, AcquisitionError> {
		decode_segment(raw, "client_info")
	}

	/// Renders the home account identifier `{uid}.{utid}`.
	pub fn home_account_id(&self) -> Result<HomeAccountId, AcquisitionError> {
		HomeAccountId::new(format!("{}.{}", self.uid, self.utid))
			.map_err(|e| AcquisitionError::MalformedIdentity { reason: e.to_string() })
	}
}

/// Subset of ID token claims used to describe an account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
	/// Object identifier.
	#[serde(default)]
	pub oid: Option<String>,
	/// Subject.
	#[serde(default)]
	pub sub: Option<String>,
	/// Tenant identifier.
	#[serde(default)]
	pub tid: Option<String>,
	/// Preferred sign-in name (Azure AD).
	#[serde(default)]
	pub preferred_username: Option<String>,
	/// Display name.
	#[serde(default)]
	pub name: Option<String>,
	/// Email addresses (Azure AD B2C).
	#[serde(default)]
	pub emails: Vec<String>,
}
impl IdTokenClaims {
	/// Decodes the payload segment of a compact JWT without verifying its signature.
	pub fn decode(id_token: &str) -> Result<Self, AcquisitionError> {
		let mut segments = id_token.split('.');
		let payload = segments.nth(1).ok_or_else(|| AcquisitionError::MalformedIdentity {
			reason: "id_token is not a compact JWT".into(),
		})?;

		decode_segment(payload, "id_token")
	}

	/// Sign-in name: `preferred_username`, then the first email, then the display name.
	pub fn username(&self) -> Option<&str> {
		self.preferred_username
			.as_deref()
			.or_else(|| self.emails.first().map(String::as_str))
			.or(self.name.as_deref())
	}

	fn home_account_id(&self) -> Option<Result<HomeAccountId, AcquisitionError>> {
		let object_id = self.oid.as_deref().or(self.sub.as_deref())?;
		let raw = match self.tid.as_deref() {
			Some(tid) => format!("{object_id}.{tid}"),
			None => object_id.to_owned(),
		};

		Some(
			HomeAccountId::new(raw)
				.map_err(|e| AcquisitionError::MalformedIdentity { reason: e.to_string() }),
		)
	}
}

/// Builds the [`Account`] described by a token response.
///
/// `client_info` wins for the identifier; ID token claims supply the username and display name
/// and act as the identifier fallback.
pub fn account_from_identity(
	client_info: Option<&str>,
	id_token: Option<&str>,
) -> Result<Account, AcquisitionError> {
	let claims = id_token.map(IdTokenClaims::decode).transpose()?.unwrap_or_default();
	let (home_account_id, tenant_id) = match client_info {
		Some(raw) => {
			let info = ClientInfo::decode(raw)?;

			(info.home_account_id()?, Some(info.utid))
		},
		None => {
			let id = claims.home_account_id().ok_or(AcquisitionError::MissingAccountIdentity)??;

			(id, claims.tid.clone())
		},
	};
	let mut account = Account::new(home_account_id);

	if let Some(tenant_id) = tenant_id {
		account = account.with_tenant_id(tenant_id);
	}
	if let Some(username) = claims.username() {
		account = account.with_username(username);
	}
	if let Some(name) = claims.name.as_deref() {
		account = account.with_name(name);
	}

	Ok(account)
}

fn decode_segment<T>(raw: &str, what: &str) -> Result<T, AcquisitionError>
where
	T: DeserializeOwned,
{
	let bytes = URL_SAFE_NO_PAD.decode(raw.trim_end_matches('=')).map_err(|e| {
		AcquisitionError::MalformedIdentity { reason: format!("{what} is not base64url: {e}") }
	})?;

	serde_json::from_slice(&bytes).map_err(|e| AcquisitionError::MalformedIdentity {
		reason: format!("{what} is not valid JSON: {e}"),
	})
}
