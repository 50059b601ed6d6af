//! Authority resolution for Azure AD and Azure AD B2C.
//!
//! Two shapes are supported: `https://{host}/{tenant}` and
//! `https://{host}/tfp/{tenant}/{policy}`. Resolution is purely syntactic; no discovery
//! document is fetched.

// self
use crate::{_prelude::*, auth::PolicyName};

const B2C_MARKER: &str = "tfp";
const AUTHORIZE_PATH: &str = "oauth2/v2.0/authorize";
const TOKEN_PATH: &str = "oauth2/v2.0/token";

/// Errors raised while composing or parsing an [`Authority`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum AuthorityError {
	/// Host is empty.
	#[error("Authority host cannot be empty.")]
	EmptyHost,
	/// Tenant is empty.
	#[error("Authority tenant cannot be empty.")]
	EmptyTenant,
	/// B2C policy is empty.
	#[error("Authority policy cannot be empty.")]
	EmptyPolicy,
	/// A segment contains characters that would change the URL structure.
	#[error("Authority {segment} `{value}` contains reserved characters.")]
	InvalidSegment {
		/// Segment name (host, tenant, policy).
		segment: &'static str,
		/// Offending value.
		value: String,
	},
	/// The composed string is not a well-formed URL.
	#[error("Authority URL is malformed.")]
	InvalidUrl {
		/// Underlying parser failure.
		#[source]
		source: url::ParseError,
	},
	/// A parsed URL does not follow either authority shape.
	#[error("`{url}` is not an Azure AD or Azure AD B2C authority.")]
	Unrecognized {
		/// URL that failed to parse.
		url: String,
	},
	/// The policy is not configured for this client.
	#[error("Policy `{policy}` is not configured.")]
	UnknownPolicy {
		/// Requested policy.
		policy: String,
	},
	/// Host or tenant differ from the client configuration.
	#[error("Authority `{url}` does not belong to this client.")]
	NotConfigured {
		/// Rejected authority URL.
		url: String,
	},
}

/// Issuer of tokens: a host, a tenant, and (for B2C) a user-flow policy.
///
/// Serialized as its canonical URL.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Authority {
	host: String,
	tenant: String,
	policy: Option<PolicyName>,
	url: Url,
}
impl Authority {
	/// Builds an authority from its parts; a policy selects the B2C shape.
	pub fn resolve(host: &str, tenant: &str, policy: Option<&str>) -> Result<Self, AuthorityError> {
		let host = host.trim().to_ascii_lowercase();
		let tenant = tenant.trim();

		if host.is_empty() {
			return Err(AuthorityError::EmptyHost);
		}
		if tenant.is_empty() {
			return Err(AuthorityError::EmptyTenant);
		}

		validate_segment("host", &host)?;
		validate_segment("tenant", tenant)?;

		let policy = match policy.map(str::trim) {
			Some("") => return Err(AuthorityError::EmptyPolicy),
			Some(raw) => {
				validate_segment("policy", raw)?;

				Some(PolicyName::new(raw).map_err(|_| AuthorityError::InvalidSegment {
					segment: "policy",
					value: raw.to_owned(),
				})?)
			},
			None => None,
		};
		let raw = match &policy {
			Some(policy) => format!("https://{host}/{B2C_MARKER}/{tenant}/{policy}"),
			None => format!("https://{host}/{tenant}"),
		};
		let url = Url::parse(&raw).map_err(|source| AuthorityError::InvalidUrl { source })?;

		if url.cannot_be_a_base() || url.host_str().is_none() {
			return Err(AuthorityError::Unrecognized { url: raw });
		}

		Ok(Self { host, tenant: tenant.to_owned(), policy, url })
	}

	/// Azure AD authority `https://{host}/{tenant}`.
	pub fn aad(host: &str, tenant: &str) -> Result<Self, AuthorityError> {
		Self::resolve(host, tenant, None)
	}

	/// Azure AD B2C authority `https://{host}/tfp/{tenant}/{policy}`.
	pub fn b2c(host: &str, tenant: &str, policy: &str) -> Result<Self, AuthorityError> {
		Self::resolve(host, tenant, Some(policy))
	}

	/// Parses a canonical authority URL back into its parts.
	pub fn parse(raw: &str) -> Result<Self, AuthorityError> {
		let url = Url::parse(raw).map_err(|source| AuthorityError::InvalidUrl { source })?;
		let unrecognized = || AuthorityError::Unrecognized { url: raw.to_owned() };

		if url.scheme() != "https" {
			return Err(unrecognized());
		}

		let host = match (url.host_str(), url.port()) {
			(Some(host), Some(port)) => format!("{host}:{port}"),
			(Some(host), None) => host.to_owned(),
			(None, _) => return Err(unrecognized()),
		};
		let segments = url
			.path_segments()
			.map(|segments| segments.filter(|s| !s.is_empty()).collect::<Vec<_>>())
			.ok_or_else(unrecognized)?;

		match segments.as_slice() {
			[tenant] => Self::aad(&host, tenant),
			[marker, tenant, policy] if marker.eq_ignore_ascii_case(B2C_MARKER) =>
				Self::b2c(&host, tenant, policy),
			_ => Err(unrecognized()),
		}
	}

	/// Host (with port, when non-default), lower-cased.
	pub fn host(&self) -> &str {
		&self.host
	}

	/// Tenant segment.
	pub fn tenant(&self) -> &str {
		&self.tenant
	}

	/// B2C policy, if this is a B2C authority.
	pub fn policy(&self) -> Option<&PolicyName> {
		self.policy.as_ref()
	}

	/// Returns `true` for B2C policy authorities.
	pub fn is_b2c(&self) -> bool {
		self.policy.is_some()
	}

	/// Canonical authority URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Authorization endpoint (`{authority}/oauth2/v2.0/authorize`).
	pub fn authorization_endpoint(&self) -> Result<Url, AuthorityError> {
		self.endpoint(AUTHORIZE_PATH)
	}

	/// Token endpoint (`{authority}/oauth2/v2.0/token`).
	pub fn token_endpoint(&self) -> Result<Url, AuthorityError> {
		self.endpoint(TOKEN_PATH)
	}

	fn endpoint(&self, path: &str) -> Result<Url, AuthorityError> {
		Url::parse(&format!("{}/{path}", self.url.as_str().trim_end_matches('/')))
			.map_err(|source| AuthorityError::InvalidUrl { source })
	}
}
impl Debug for Authority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Authority({})", self.url)
	}
}
impl Display for Authority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.url.as_str())
	}
}
impl FromStr for Authority {
	type Err = AuthorityError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl TryFrom<String> for Authority {
	type Error = AuthorityError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(&value)
	}
}
impl From<Authority> for String {
	fn from(value: Authority) -> Self {
		value.url.into()
	}
}

fn validate_segment(segment: &'static str, value: &str) -> Result<(), AuthorityError> {
	if value.chars().any(|c| matches!(c, '/' | '?' | '#' | '\\') || c.is_whitespace()) {
		return Err(AuthorityError::InvalidSegment { segment, value: value.to_owned() });
	}

	Ok(())
}
