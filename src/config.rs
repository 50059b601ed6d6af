//! Client configuration: identifiers, redirect, authority parts, B2C policies, and scopes.
//!
//! Nothing is hardcoded; the UI layer builds a [`ClientConfig`] or loads one from JSON.

// self
use crate::{
	_prelude::*,
	auth::{PolicyName, ScopeSet},
	authority::{Authority, AuthorityError},
	error::ConfigError,
};

/// Default Azure AD host.
pub const DEFAULT_AUTHORITY_HOST: &str = "login.microsoftonline.com";
/// Default Azure AD tenant.
pub const DEFAULT_TENANT: &str = "common";

/// Named B2C user flows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolicyKind {
	/// Combined sign-up and sign-in flow.
	SignUpSignIn,
	/// Profile editing flow.
	EditProfile,
	/// Password reset flow.
	ResetPassword,
}

/// B2C policy names configured for the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct B2cPolicies {
	/// Sign-up/sign-in policy, used as the default authority.
	pub sign_up_sign_in: PolicyName,
	/// Profile editing policy.
	#[serde(default)]
	pub edit_profile: Option<PolicyName>,
	/// Password reset policy.
	#[serde(default)]
	pub reset_password: Option<PolicyName>,
}
impl B2cPolicies {
	/// Creates a policy set with only the sign-up/sign-in flow.
	pub fn new(sign_up_sign_in: impl AsRef<str>) -> Result<Self, ConfigError> {
		Ok(Self {
			sign_up_sign_in: PolicyName::new(sign_up_sign_in)?,
			edit_profile: None,
			reset_password: None,
		})
	}

	/// Adds the profile editing flow.
	pub fn with_edit_profile(mut self, policy: impl AsRef<str>) -> Result<Self, ConfigError> {
		self.edit_profile = Some(PolicyName::new(policy)?);

		Ok(self)
	}

	/// Adds the password reset flow.
	pub fn with_reset_password(mut self, policy: impl AsRef<str>) -> Result<Self, ConfigError> {
		self.reset_password = Some(PolicyName::new(policy)?);

		Ok(self)
	}

	/// Returns the configured name for a flow.
	pub fn get(&self, kind: PolicyKind) -> Option<&PolicyName> {
		match kind {
			PolicyKind::SignUpSignIn => Some(&self.sign_up_sign_in),
			PolicyKind::EditProfile => self.edit_profile.as_ref(),
			PolicyKind::ResetPassword => self.reset_password.as_ref(),
		}
	}

	/// Returns `true` when `policy` names one of the configured flows (case-insensitive).
	pub fn contains(&self, policy: &str) -> bool {
		[Some(&self.sign_up_sign_in), self.edit_profile.as_ref(), self.reset_password.as_ref()]
			.into_iter()
			.flatten()
			.any(|configured| configured.eq_ignore_ascii_case(policy))
	}
}

/// Validated public client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Application (client) identifier.
	pub client_id: String,
	/// Explicit redirect URI; defaults to `msauth.{app_identifier}://auth`.
	#[serde(default)]
	pub redirect_uri: Option<Url>,
	/// Application bundle identifier used to derive the default redirect URI.
	#[serde(default)]
	pub app_identifier: Option<String>,
	/// Authority host.
	#[serde(default = "default_authority_host")]
	pub authority_host: String,
	/// Tenant (directory) name or identifier.
	#[serde(default = "default_tenant")]
	pub tenant: String,
	/// B2C policies; absent for plain Azure AD clients.
	#[serde(default)]
	pub policies: Option<B2cPolicies>,
	/// Scopes requested when the caller does not pass any.
	#[serde(default)]
	pub scopes: Vec<String>,
}
impl ClientConfig {
	/// Starts a builder for the provided client identifier.
	pub fn builder(client_id: impl Into<String>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(client_id)
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json(raw: &str) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::Parse { source })?;

		config.validate()?;

		Ok(config)
	}

	/// Checks identifiers, redirect, and the default authority.
	pub fn validate(&self) -> Result<()> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId.into());
		}

		self.redirect_uri()?;
		self.default_authority()?;
		self.default_scopes()?;

		Ok(())
	}

	/// Redirect URI registered for the client.
	pub fn redirect_uri(&self) -> Result<Url, ConfigError> {
		if let Some(uri) = &self.redirect_uri {
			return Ok(uri.clone());
		}

		let app = self
			.app_identifier
			.as_deref()
			.filter(|app| !app.trim().is_empty())
			.ok_or(ConfigError::MissingRedirect)?;

		Url::parse(&format!("msauth.{app}://auth"))
			.map_err(|source| ConfigError::InvalidRedirect { source })
	}

	/// Resolves the authority for an optional B2C policy.
	pub fn authority(&self, policy: Option<&str>) -> Result<Authority, AuthorityError> {
		Authority::resolve(&self.authority_host, &self.tenant, policy)
	}

	/// Sign-up/sign-in authority for B2C clients, the tenant authority otherwise.
	pub fn default_authority(&self) -> Result<Authority, AuthorityError> {
		self.authority(self.policies.as_ref().map(|p| p.sign_up_sign_in.as_ref()))
	}

	/// Authority for a named B2C flow.
	pub fn policy_authority(&self, kind: PolicyKind) -> Result<Authority, AuthorityError> {
		let policy = self.policies.as_ref().and_then(|p| p.get(kind)).ok_or_else(|| {
			AuthorityError::UnknownPolicy { policy: format!("{kind:?}") }
		})?;

		self.authority(Some(policy.as_ref()))
	}

	/// Returns `Ok(())` when the authority belongs to this client.
	///
	/// Host and tenant must match; a B2C policy must be one of the configured flows.
	pub fn accept(&self, authority: &Authority) -> Result<(), AuthorityError> {
		let own = self.authority(None)?;

		if !own.host().eq_ignore_ascii_case(authority.host())
			|| !own.tenant().eq_ignore_ascii_case(authority.tenant())
		{
			return Err(AuthorityError::NotConfigured { url: authority.to_string() });
		}

		match (authority.policy(), &self.policies) {
			(None, _) => Ok(()),
			(Some(policy), Some(policies)) if policies.contains(policy) => Ok(()),
			(Some(policy), _) => Err(AuthorityError::UnknownPolicy { policy: policy.to_string() }),
		}
	}

	/// Configured default scopes as a normalized set.
	pub fn default_scopes(&self) -> Result<ScopeSet, ConfigError> {
		Ok(ScopeSet::new(self.scopes.iter().cloned())?)
	}
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
	config: ClientConfig,
}
impl ClientConfigBuilder {
	fn new(client_id: impl Into<String>) -> Self {
		Self {
			config: ClientConfig {
				client_id: client_id.into(),
				redirect_uri: None,
				app_identifier: None,
				authority_host: default_authority_host(),
				tenant: default_tenant(),
				policies: None,
				scopes: Vec::new(),
			},
		}
	}

	/// Sets an explicit redirect URI.
	pub fn redirect_uri(mut self, uri: Url) -> Self {
		self.config.redirect_uri = Some(uri);

		self
	}

	/// Sets the application identifier used for the default redirect URI.
	pub fn app_identifier(mut self, app: impl Into<String>) -> Self {
		self.config.app_identifier = Some(app.into());

		self
	}

	/// Overrides the authority host.
	pub fn authority_host(mut self, host: impl Into<String>) -> Self {
		self.config.authority_host = host.into();

		self
	}

	/// Overrides the tenant.
	pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
		self.config.tenant = tenant.into();

		self
	}

	/// Configures B2C policies.
	pub fn policies(mut self, policies: B2cPolicies) -> Self {
		self.config.policies = Some(policies);

		self
	}

	/// Sets the default scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.config.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Validates and returns the configuration.
	pub fn build(self) -> Result<ClientConfig> {
		self.config.validate()?;

		Ok(self.config)
	}
}

fn default_authority_host() -> String {
	DEFAULT_AUTHORITY_HOST.into()
}

fn default_tenant() -> String {
	DEFAULT_TENANT.into()
}
