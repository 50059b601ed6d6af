//! Normalized OAuth scope sets.
//!
//! Scopes compare case-insensitively when checking coverage because the identity platform
//! echoes granted scopes with its own casing.

// std
use std::collections::BTreeSet;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// OpenID Connect scopes the broker adds to every request and strips from cache keys.
pub const RESERVED_SCOPES: [&str; 3] = ["offline_access", "openid", "profile"];

/// Scope validation failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// A scope entry was empty.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// A scope entry carried whitespace.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// Rejected entry.
		scope: String,
	},
}

/// Sorted, deduplicated set of scopes.
///
/// Serialized as a JSON array; deserialization re-validates every entry.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ScopeSet(Vec<String>);
impl ScopeSet {
	/// Validates and normalizes the provided scopes.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut set = BTreeSet::new();

		for scope in scopes {
			let scope = scope.into();

			if scope.is_empty() {
				return Err(ScopeValidationError::Empty);
			}
			if scope.chars().any(char::is_whitespace) {
				return Err(ScopeValidationError::ContainsWhitespace { scope });
			}

			set.insert(scope);
		}

		Ok(Self(set.into_iter().collect()))
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether the set is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Exact membership test.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.binary_search_by(|held| held.as_str().cmp(scope)).is_ok()
	}

	/// Scopes in sorted order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Space-delimited form used on the wire.
	pub fn normalized(&self) -> String {
		self.0.join(" ")
	}

	/// URL-safe SHA-256 digest of [`normalized`](Self::normalized), used to partition cache keys.
	pub fn fingerprint(&self) -> String {
		URL_SAFE_NO_PAD.encode(Sha256::digest(self.normalized().as_bytes()))
	}

	/// Returns true if every scope in `other` is covered by this set (ASCII case-insensitive).
	pub fn is_superset_of(&self, other: &ScopeSet) -> bool {
		other.iter().all(|wanted| self.iter().any(|held| held.eq_ignore_ascii_case(wanted)))
	}

	/// Returns a copy that also carries the reserved OpenID Connect scopes.
	pub fn with_reserved(&self) -> ScopeSet {
		Self::collect(self.iter().chain(RESERVED_SCOPES))
	}

	/// Returns a copy without the reserved OpenID Connect scopes.
	pub fn without_reserved(&self) -> ScopeSet {
		Self::collect(
			self.iter().filter(|scope| !RESERVED_SCOPES.iter().any(|r| r.eq_ignore_ascii_case(scope))),
		)
	}

	/// Returns the union of both sets.
	pub fn union(&self, other: &ScopeSet) -> ScopeSet {
		Self::collect(self.iter().chain(other.iter()))
	}

	// Inputs are already validated entries.
	fn collect<'a>(scopes: impl Iterator<Item = &'a str>) -> ScopeSet {
		Self(scopes.map(str::to_owned).collect::<BTreeSet<_>>().into_iter().collect())
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.0).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"" => Ok(Self::default()),
			s if s.trim().is_empty() => Err(ScopeValidationError::Empty),
			s => Self::new(s.split_whitespace()),
		}
	}
}
impl TryFrom<Vec<String>> for ScopeSet {
	type Error = ScopeValidationError;

	fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<ScopeSet> for Vec<String> {
	fn from(value: ScopeSet) -> Self {
		value.0
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn new_sorts_and_dedups() {
		let lhs = ScopeSet::new(["demo.write", "demo.read", "demo.read"])
			.expect("Scope fixture should be valid.");
		let rhs = ScopeSet::new(["demo.read", "demo.write"]).expect("Scope fixture should be valid.");

		assert_eq!(lhs, rhs);
		assert_eq!(lhs.normalized(), "demo.read demo.write");
		assert_eq!(lhs.iter().collect::<Vec<_>>(), vec!["demo.read", "demo.write"]);
		assert!(lhs.contains("demo.write"));
		assert_eq!(lhs.fingerprint(), rhs.fingerprint());
		assert_ne!(lhs.fingerprint(), ScopeSet::default().fingerprint());
	}

	#[test]
	fn malformed_entries_are_rejected() {
		assert_eq!(ScopeSet::new([""]), Err(ScopeValidationError::Empty));
		assert!(matches!(
			ScopeSet::new(["demo read"]),
			Err(ScopeValidationError::ContainsWhitespace { ref scope }) if scope == "demo read"
		));
		assert_eq!("".parse::<ScopeSet>(), Ok(ScopeSet::default()));
		assert_eq!("  ".parse::<ScopeSet>(), Err(ScopeValidationError::Empty));
		assert_eq!(
			"openid  demo.read".parse::<ScopeSet>().map(|s| s.len()),
			Ok(2),
			"Repeated separators are tolerated."
		);
	}

	#[test]
	fn superset_checks_ignore_ascii_case() {
		let granted = ScopeSet::new(["User.Read", "Mail.Read"]).expect("Granted scopes are valid.");
		let wanted = ScopeSet::new(["user.read"]).expect("Wanted scopes are valid.");
		let wider = ScopeSet::new(["user.read", "calendars.read"]).expect("Wider scopes are valid.");

		assert!(granted.is_superset_of(&wanted));
		assert!(!granted.is_superset_of(&wider));
		assert!(granted.is_superset_of(&ScopeSet::default()));
	}

	#[test]
	fn reserved_scopes_are_added_and_stripped() {
		let scope = ScopeSet::new(["https://fabrikamb2c.onmicrosoft.com/helloapi/demo.read"])
			.expect("API scope should be valid.");
		let requested = scope.with_reserved();

		assert_eq!(requested.len(), 4);
		assert!(requested.contains("offline_access"));
		assert!(requested.contains("openid"));
		assert_eq!(requested.without_reserved(), scope);

		let echoed = ScopeSet::new(["OpenID", "demo.read"]).expect("Echoed scopes are valid.");

		assert_eq!(echoed.without_reserved().normalized(), "demo.read");
		assert_eq!(echoed.union(&scope).len(), 3);
	}

	#[test]
	fn json_form_is_a_validated_array() {
		let scope = ScopeSet::new(["b", "a"]).expect("Scope fixture should be valid.");

		assert_eq!(serde_json::to_string(&scope).expect("Serialize should succeed."), r#"["a","b"]"#);
		assert!(serde_json::from_str::<ScopeSet>(r#"["a b"]"#).is_err());
	}
}
