//! Signed-in accounts and B2C policy tags.

// self
use crate::{_prelude::*, auth::HomeAccountId};

const GUID_LEN: usize = 36;

/// Identity that completed interactive authentication against an authority.
///
/// Accounts are owned by the [`AccountStore`](crate::cache::AccountStore); token records
/// refer to them by [`HomeAccountId`] only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
	/// Stable home account identifier (`{uid}.{utid}`).
	pub home_account_id: HomeAccountId,
	/// Sign-in name reported by the identity provider.
	pub username: Option<String>,
	/// Display name reported by the identity provider.
	pub name: Option<String>,
	/// Home tenant identifier.
	pub tenant_id: Option<String>,
	/// B2C policy the account signed in with, derived from the home account id.
	pub policy_tag: Option<String>,
}
impl Account {
	/// Creates an account, deriving the tenant and policy tag from the identifier.
	pub fn new(home_account_id: HomeAccountId) -> Self {
		let tenant_id = home_account_id.tenant_id().map(ToOwned::to_owned);
		let policy_tag = policy_tag_of(home_account_id.object_id());

		Self { home_account_id, username: None, name: None, tenant_id, policy_tag }
	}

	/// Sets the sign-in name.
	pub fn with_username(mut self, username: impl Into<String>) -> Self {
		self.username = Some(username.into());

		self
	}

	/// Sets the display name.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());

		self
	}

	/// Overrides the tenant identifier.
	pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
		self.tenant_id = Some(tenant_id.into());

		self
	}

	/// Returns `true` when the object-id part of the home account id ends with `policy`,
	/// compared case-insensitively.
	pub fn matches_policy(&self, policy: &str) -> bool {
		let object_id = self.home_account_id.object_id().to_ascii_lowercase();

		object_id.ends_with(&policy.to_ascii_lowercase())
	}
}

/// B2C object ids are rendered as `{guid}-{policy}`.
fn policy_tag_of(object_id: &str) -> Option<String> {
	let guid = object_id.get(..GUID_LEN)?;
	let rest = object_id.get(GUID_LEN..)?;
	let tag = rest.strip_prefix('-')?;

	if tag.is_empty() || !is_guid(guid) {
		return None;
	}

	Some(tag.to_owned())
}

fn is_guid(view: &str) -> bool {
	view.bytes().enumerate().all(|(i, b)| match i {
		8 | 13 | 18 | 23 => b == b'-',
		_ => b.is_ascii_hexdigit(),
	})
}
