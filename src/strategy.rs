//! Provider strategy hooks that customize token exchanges for the Microsoft identity
//! platform.
//!
//! Implementations decorate outgoing token requests and classify failures into the broker
//! taxonomy without tying flows to any particular HTTP client.

// self
use crate::_prelude::*;

/// Error codes (OAuth `error` values and `AADSTS`/`AADB2C` codes) that demand interaction.
pub const INTERACTION_REQUIRED_CODES: [&str; 13] = [
	"invalid_grant",
	"interaction_required",
	"login_required",
	"consent_required",
	"AADSTS50076",
	"AADSTS50079",
	"AADSTS50078",
	"AADSTS50158",
	"AADSTS65001",
	"AADSTS50173",
	"AADSTS700082",
	"AADSTS70008",
	"AADB2C90080",
];
/// B2C code reported when the user abandons a flow.
pub const B2C_USER_CANCELLED: &str = "AADB2C90091";

/// OAuth 2.0 grant types issued by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant with PKCE.
	AuthorizationCode,
	/// Refresh Token grant used by silent acquisition.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Strategy hook that allows providers to decorate requests and classify errors.
///
/// Implementors are required to be `Send + Sync`, and the hooks use crate-owned data types
/// so downstream crates never depend on transport-specific structures.
pub trait ProviderStrategy: Send + Sync {
	/// Maps token endpoint failures into the broker taxonomy.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Returns `true` when an authorization redirect error means the user backed out.
	fn is_user_cancellation(&self, error: &str, description: Option<&str>) -> bool {
		error.eq_ignore_ascii_case("access_denied")
			&& description.is_some_and(|d| d.to_ascii_uppercase().contains(B2C_USER_CANCELLED))
	}

	/// Gives providers a chance to add custom form parameters before dispatching.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// The grant can only be renewed by the user interacting with the authority.
	InteractionRequired,
	/// Client registration or redirect problems.
	InvalidClient,
	/// Requested scopes are invalid or not consented.
	InsufficientScope,
	/// Any other permanent rejection.
	Rejected,
	/// Failure is temporary; the caller may try again later.
	Transient,
}

/// Context passed to provider strategies when classifying token errors.
///
/// Only primitive data is kept (status codes, OAuth fields, body preview) so strategies stay
/// decoupled from the HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
	/// Indicates whether the failure originated from the network/transport layer.
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Convenience constructor for transport-level failures.
	pub fn network_failure(grant_type: GrantType) -> Self {
		let mut ctx = Self::new(grant_type);

		ctx.network_error = true;

		ctx
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for responses that are not OAuth JSON.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}

	/// Human-readable reason carried into errors.
	pub fn reason(&self) -> String {
		match (&self.oauth_error, &self.error_description) {
			(Some(error), Some(description)) => format!("{error}: {description}"),
			(Some(error), None) => error.clone(),
			(None, Some(description)) => description.clone(),
			(None, None) => self
				.body_preview
				.clone()
				.or_else(|| self.http_status.map(|s| format!("HTTP {s}")))
				.unwrap_or_else(|| "unknown error".into()),
		}
	}
}

/// Strategy for Azure AD and Azure AD B2C authorities.
///
/// Interaction-required codes are checked first (in the `error` field, then inside
/// `error_description`), then the remaining OAuth error values, then body hints, and finally
/// the HTTP status. Every request is augmented with `client_info=1` so responses identify
/// the home account.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("microsoft-identity-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}
		if [&ctx.oauth_error, &ctx.error_description, &ctx.body_preview]
			.into_iter()
			.flatten()
			.any(|text| requires_interaction(text))
		{
			// Only silent refreshes fall back to interaction.
			return match ctx.grant_type {
				GrantType::RefreshToken => ProviderErrorKind::InteractionRequired,
				GrantType::AuthorizationCode => ProviderErrorKind::Rejected,
			};
		}
		if let Some(kind) = ctx.oauth_error.as_deref().and_then(match_exact_value) {
			return kind;
		}
		if let Some(kind) = classify_body(ctx.body_preview.as_deref()) {
			return kind;
		}

		classify_status(ctx.http_status)
	}

	fn augment_token_request(&self, _grant: GrantType, form: &mut BTreeMap<String, String>) {
		form.entry("client_info".into()).or_insert_with(|| "1".into());
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(ProviderErrorContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn requires_interaction(text: &str) -> bool {
	let upper = text.to_ascii_uppercase();

	INTERACTION_REQUIRED_CODES.iter().any(|code| {
		if code.starts_with("AAD") {
			upper.contains(code)
		} else {
			text.trim().eq_ignore_ascii_case(code)
				|| upper.contains(&format!("\"{}\"", code.to_ascii_uppercase()))
		}
	})
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
		|| value.eq_ignore_ascii_case("invalid_request")
	{
		Some(ProviderErrorKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("invalid_scope")
		|| value.eq_ignore_ascii_case("insufficient_scope")
	{
		Some(ProviderErrorKind::InsufficientScope)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(ProviderErrorKind::Transient)
	} else if value.eq_ignore_ascii_case("access_denied")
		|| value.eq_ignore_ascii_case("unsupported_grant_type")
	{
		Some(ProviderErrorKind::Rejected)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_client") => Some(ProviderErrorKind::InvalidClient),
		text if text.contains("insufficient_scope") || text.contains("invalid_scope") =>
			Some(ProviderErrorKind::InsufficientScope),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::InsufficientScope,
		Some(429) => ProviderErrorKind::Transient,
		Some(code) if code >= 500 => ProviderErrorKind::Transient,
		Some(_) => ProviderErrorKind::Rejected,
		None => ProviderErrorKind::Transient,
	}
}
