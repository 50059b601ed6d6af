//! OAuth client facade over the `oauth2` crate for token endpoint exchanges.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthUrl, AuthorizationCode, Client, ClientId, EndpointNotSet, EndpointSet, ExtraTokenFields,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError, Scope,
	StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	authority::Authority,
	error::{AcquisitionError, ConfigError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	strategy::{GrantType, ProviderErrorContext, ProviderErrorKind, ProviderStrategy},
};

type IdentityTokenResponse = StandardTokenResponse<IdentityTokenFields, BasicTokenType>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	IdentityTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Identity fields the Microsoft identity platform adds to token responses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityTokenFields {
	/// Raw OpenID Connect ID token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
	/// Base64url JSON `{uid, utid}` identifying the home account.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_info: Option<String>,
}
impl ExtraTokenFields for IdentityTokenFields {}

/// Successful token endpoint response, before it becomes a record and an account.
#[derive(Clone)]
pub struct TokenGrant {
	/// Access token value.
	pub access_token: String,
	/// Validated lifetime of the access token.
	pub expires_in: Duration,
	/// Rotated refresh token, if issued.
	pub refresh_token: Option<String>,
	/// Raw ID token, if issued.
	pub id_token: Option<String>,
	/// Raw `client_info`, if issued.
	pub client_info: Option<String>,
	/// Scopes the authority reports as granted, if echoed.
	pub granted_scope: Option<ScopeSet>,
	/// Instant the response arrived.
	pub received_at: OffsetDateTime,
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("client_info", &self.client_info)
			.field("granted_scope", &self.granted_scope)
			.field("received_at", &self.received_at)
			.finish()
	}
}

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(strategy, grant, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => AcquisitionError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_generic_transport_error(meta, "unrecognized transport failure"),
		}
	}
}

pub(crate) trait OAuth2Facade {
	fn exchange_authorization_code<'a, 'strategy, 'code, 'pkce, 'scope>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		code: &'code str,
		pkce_verifier: &'pkce str,
		requested_scope: &'scope ScopeSet,
	) -> FacadeFuture<'a, TokenGrant>
	where
		'strategy: 'a,
		'code: 'a,
		'pkce: 'a,
		'scope: 'a;

	fn refresh_token<'a, 'strategy, 'refresh, 'scope>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		refresh_token: &'refresh str,
		requested_scope: &'scope ScopeSet,
	) -> FacadeFuture<'a, TokenGrant>
	where
		'strategy: 'a,
		'refresh: 'a,
		'scope: 'a;
}

/// Public-client facade bound to one authority's endpoints.
pub(crate) struct BasicFacade<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredClient,
	redirect_uri: RedirectUrl,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn for_authority(
		authority: &Authority,
		client_id: &str,
		redirect_uri: &Url,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(authority.authorization_endpoint()?.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let token_url = TokenUrl::new(authority.token_endpoint()?.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let redirect_uri = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let oauth_client: ConfiguredClient = Client::new(ClientId::new(client_id.to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		Ok(Self {
			oauth_client,
			redirect_uri,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_authorization_code<'a, 'strategy, 'code, 'pkce, 'scope>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		code: &'code str,
		pkce_verifier: &'pkce str,
		requested_scope: &'scope ScopeSet,
	) -> FacadeFuture<'a, TokenGrant>
	where
		'strategy: 'a,
		'code: 'a,
		'pkce: 'a,
		'scope: 'a,
	{
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
				.set_redirect_uri(Cow::Borrowed(&self.redirect_uri))
				.add_extra_param("scope", requested_scope.with_reserved().normalized());

			for (key, value) in augmented_form(strategy, GrantType::AuthorizationCode) {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::AuthorizationCode,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			into_grant(response)
		})
	}

	fn refresh_token<'a, 'strategy, 'refresh, 'scope>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		refresh_token: &'refresh str,
		requested_scope: &'scope ScopeSet,
	) -> FacadeFuture<'a, TokenGrant>
	where
		'strategy: 'a,
		'refresh: 'a,
		'scope: 'a,
	{
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&refresh_secret);

			for scope in requested_scope.with_reserved().iter() {
				request = request.add_scope(Scope::new(scope.to_owned()));
			}
			for (key, value) in augmented_form(strategy, GrantType::RefreshToken) {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::RefreshToken,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			into_grant(response)
		})
	}
}

fn augmented_form(strategy: &dyn ProviderStrategy, grant: GrantType) -> BTreeMap<String, String> {
	let mut form = BTreeMap::new();

	strategy.augment_token_request(grant, &mut form);

	form
}

fn into_grant(response: IdentityTokenResponse) -> Result<TokenGrant> {
	let expires_in = response.expires_in().ok_or(AcquisitionError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| AcquisitionError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(AcquisitionError::NonPositiveExpiresIn.into());
	}

	let granted_scope = match response.scopes() {
		Some(scopes) => Some(
			ScopeSet::new(scopes.iter().map(|scope| scope.as_str().to_owned()))
				.map_err(ConfigError::from)?,
		),
		None => None,
	};
	let extra = response.extra_fields();

	Ok(TokenGrant {
		access_token: response.access_token().secret().to_owned(),
		expires_in: Duration::seconds(expires_in),
		refresh_token: response.refresh_token().map(|token| token.secret().to_owned()),
		id_token: extra.id_token.clone(),
		client_info: extra.client_info.clone(),
		granted_scope,
		received_at: OffsetDateTime::now_utc(),
	})
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => {
			let mut ctx = ProviderErrorContext::new(grant)
				.with_oauth_error(response.error().as_ref().to_string());

			if let Some(description) = response.error_description() {
				ctx = ctx.with_error_description(description.clone());
			}

			classified_error(strategy, ctx, meta_ref)
		},
		RequestTokenError::Request(error) => mapper.map_transport_error(strategy, grant, meta_ref, error),
		RequestTokenError::Parse(source, body) => match meta_status(meta_ref) {
			Some(status) if !(200..300).contains(&status) => {
				let ctx = ProviderErrorContext::new(grant)
					.with_body_preview(String::from_utf8_lossy(&body).into_owned());

				classified_error(strategy, ctx, meta_ref)
			},
			status => AcquisitionError::TokenResponseParse { source, status }.into(),
		},
		RequestTokenError::Other(message) => AcquisitionError::TokenEndpoint {
			message,
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		}
		.into(),
	}
}

fn classified_error(
	strategy: &dyn ProviderStrategy,
	mut ctx: ProviderErrorContext,
	meta: Option<&ResponseMetadata>,
) -> Error {
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let reason = ctx.reason();

	match strategy.classify_token_error(&ctx) {
		ProviderErrorKind::InteractionRequired if ctx.grant_type == GrantType::RefreshToken =>
			Error::InteractionRequired { account: None, reason },
		ProviderErrorKind::InteractionRequired => AcquisitionError::Rejected { reason }.into(),
		ProviderErrorKind::InvalidClient
		| ProviderErrorKind::InsufficientScope
		| ProviderErrorKind::Rejected => AcquisitionError::Rejected { reason }.into(),
		ProviderErrorKind::Transient => AcquisitionError::TokenEndpoint {
			message: reason,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_reqwest_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	let _ = (strategy, grant);

	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return AcquisitionError::TokenEndpoint {
			message: "request timed out".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	AcquisitionError::from(err).into()
}

fn map_generic_transport_error(meta: Option<&ResponseMetadata>, message: impl Display) -> Error {
	AcquisitionError::TokenEndpoint {
		message: format!("HTTP client error: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
