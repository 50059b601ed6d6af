//! Broker-level error taxonomy shared across authorities, caches, flows, and resource calls.

// self
use crate::{_prelude::*, auth::HomeAccountId};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Authority configuration cannot be turned into a valid issuer URL.
	#[error(transparent)]
	InvalidAuthority(#[from] crate::authority::AuthorityError),
	/// The account is not present in the account store.
	#[error("Account {account} is not present in the account store.")]
	AccountNotFound {
		/// Home account identifier that was looked up.
		account: HomeAccountId,
	},
	/// Silent acquisition cannot proceed; fall back to interactive acquisition.
	///
	/// The bound account, when known, should be passed back to
	/// [`InteractiveRequest::with_account`](crate::flows::InteractiveRequest::with_account) so
	/// the user re-authenticates the same identity.
	#[error("Interaction is required: {reason}.")]
	InteractionRequired {
		/// Account the silent attempt was bound to.
		account: Option<HomeAccountId>,
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// The user closed the interactive agent before completing authentication.
	#[error("The user cancelled the interactive authentication.")]
	UserCancelled,
	/// Network or server-side failure while acquiring a token.
	#[error(transparent)]
	Acquisition(#[from] AcquisitionError),
	/// Another acquisition for the same account and authority is still in flight.
	#[error("An acquisition for {key} is already in flight.")]
	ConcurrentAcquisition {
		/// Rendered account/authority key.
		key: String,
	},
	/// Resource call failure.
	#[error(transparent)]
	Http(#[from] crate::resource::HttpError),
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns `true` when the caller should fall back to interactive acquisition.
	pub fn is_interaction_required(&self) -> bool {
		matches!(self, Self::InteractionRequired { .. })
	}

	/// Returns `true` when repeating the same call later may succeed.
	///
	/// The broker never retries on its own; this is a hint for callers.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::ConcurrentAcquisition { .. } => true,
			Self::Acquisition(err) => err.is_transient(),
			Self::Http(err) => err.is_transient(),
			_ => false,
		}
	}

	pub(crate) fn bind_account(self, bound: &HomeAccountId) -> Self {
		match self {
			Self::InteractionRequired { account: None, reason } =>
				Self::InteractionRequired { account: Some(bound.clone()), reason },
			other => other,
		}
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Authority endpoint cannot be parsed by the OAuth client.
	#[error("Authority endpoint is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Neither a redirect URI nor an application identifier was configured.
	#[error("A redirect URI or an application identifier is required.")]
	MissingRedirect,
	/// Client identifier is empty.
	#[error("Client identifier cannot be empty.")]
	MissingClientId,
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// An acquisition was requested without any scopes.
	#[error("At least one scope must be requested.")]
	EmptyScopes,
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
	/// A configured policy name is invalid.
	#[error("Policy name is invalid.")]
	InvalidPolicy(#[from] crate::auth::IdentifierError),
	/// JSON configuration could not be parsed.
	#[error("Client configuration is malformed at `{path}`.", path = .source.path())]
	Parse {
		/// Structured parsing failure including the failing JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Network, protocol, and server-side failures surfaced while acquiring tokens.
///
/// None of these are retried by the broker.
#[derive(Debug, ThisError)]
pub enum AcquisitionError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
	/// Authority rejected the request (client, scope, or grant problems).
	#[error("Authority rejected the request: {reason}.")]
	Rejected {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// The authorization redirect carried an OAuth error.
	#[error("Authorization failed with `{error}`{suffix}.", suffix = describe(.description))]
	Authorization {
		/// OAuth `error` parameter.
		error: String,
		/// OAuth `error_description` parameter.
		description: Option<String>,
	},
	/// The interactive agent failed without a redirect.
	#[error("Interactive agent failed: {message}.")]
	Agent {
		/// Agent-supplied message.
		message: String,
	},
	/// The redirect `state` did not match the session.
	#[error("Authorization state mismatch.")]
	StateMismatch,
	/// The redirect carried neither a code nor an error.
	#[error("Authorization redirect is missing the code parameter.")]
	MissingAuthorizationCode,
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Neither `client_info` nor ID token claims identified the account.
	#[error("Token response does not identify an account.")]
	MissingAccountIdentity,
	/// `client_info` or the ID token could not be decoded.
	#[error("Identity payload is malformed: {reason}.")]
	MalformedIdentity {
		/// Decoder-supplied reason string.
		reason: String,
	},
}
impl AcquisitionError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns `true` for failures that may clear up on their own.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::TokenEndpoint { .. } | Self::Network { .. } | Self::Io(_))
	}
}
impl From<ReqwestError> for AcquisitionError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

fn describe(description: &Option<String>) -> String {
	description.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn interaction_required_binds_account_once() {
		let first = HomeAccountId::new("uid-1.utid").expect("Account fixture should be valid.");
		let second = HomeAccountId::new("uid-2.utid").expect("Account fixture should be valid.");
		let err = Error::InteractionRequired { account: None, reason: "invalid_grant".into() }
			.bind_account(&first)
			.bind_account(&second);

		assert!(err.is_interaction_required());
		assert!(matches!(err, Error::InteractionRequired { account: Some(ref id), .. } if *id == first));
	}

	#[test]
	fn retryable_covers_transient_failures_only() {
		let transient: Error = AcquisitionError::TokenEndpoint {
			message: "timeout".into(),
			status: None,
			retry_after: None,
		}
		.into();
		let rejected: Error = AcquisitionError::Rejected { reason: "invalid_client".into() }.into();

		assert!(transient.is_retryable());
		assert!(!rejected.is_retryable());
		assert!(!Error::UserCancelled.is_retryable());
		assert!(Error::ConcurrentAcquisition { key: "k".into() }.is_retryable());
	}

	#[test]
	fn authorization_error_renders_description() {
		let err = AcquisitionError::Authorization {
			error: "server_error".into(),
			description: Some("AADB2C90118".into()),
		};

		assert_eq!(err.to_string(), "Authorization failed with `server_error`: AADB2C90118.");
	}
}
