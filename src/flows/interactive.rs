//! Interactive acquisition: Authorization Code + PKCE through the [`InteractiveAgent`].
//!
//! The engine builds the authorize URL (random `state`, S256 challenge, reserved OpenID
//! Connect scopes, `client_info=1`), hands it to the agent, validates the redirect, and
//! exchanges the code. A successful exchange upserts the signed-in [`Account`], stores the
//! [`TokenRecord`], and replaces the refresh credential for the authority.

mod session;

// self
use crate::{
	_prelude::*,
	agent::{AgentOutcome, AgentRequest, InteractiveAgent},
	auth::{self, Account, HomeAccountId, RefreshCredential, ScopeSet, TokenRecord},
	authority::Authority,
	error::AcquisitionError,
	flows::{
		Engine,
		common::{self, AcquisitionState, GuardKey},
	},
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};
use session::{AuthorizationSession, AuthorizeParams};

/// `prompt` values understood by the Microsoft identity platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Prompt {
	/// Always ask for credentials.
	Login,
	/// Let the user pick among signed-in accounts.
	#[default]
	SelectAccount,
	/// Ask for consent even if it was granted before.
	Consent,
	/// Never show UI; the authority errors out if interaction is needed.
	None,
}
impl Prompt {
	/// Query parameter value.
	pub const fn as_str(self) -> &'static str {
		match self {
			Prompt::Login => "login",
			Prompt::SelectAccount => "select_account",
			Prompt::Consent => "consent",
			Prompt::None => "none",
		}
	}
}

/// Parameters for [`Engine::acquire_interactive`].
#[derive(Clone, Debug)]
pub struct InteractiveRequest {
	/// Authority to sign in against.
	pub authority: Authority,
	/// Scopes the access token must cover.
	pub scopes: ScopeSet,
	/// Account to re-authenticate; only used as a `login_hint`.
	pub account: Option<HomeAccountId>,
	/// `prompt` behavior.
	pub prompt: Prompt,
	/// Scopes to consent to up front without requesting a token for them.
	pub extra_scopes_to_consent: Option<ScopeSet>,
	/// Additional authorize URL query parameters (e.g. `domain_hint`).
	pub extra_query_parameters: Vec<(String, String)>,
}
impl InteractiveRequest {
	/// Creates a request with the default prompt and no bound account.
	pub fn new(authority: Authority, scopes: ScopeSet) -> Self {
		Self {
			authority,
			scopes,
			account: None,
			prompt: Prompt::default(),
			extra_scopes_to_consent: None,
			extra_query_parameters: Vec::new(),
		}
	}

	/// Binds the request to a known account, typically the one carried by
	/// [`Error::InteractionRequired`].
	pub fn with_account(mut self, account: impl Into<Option<HomeAccountId>>) -> Self {
		self.account = account.into();

		self
	}

	/// Overrides the `prompt` behavior.
	pub fn with_prompt(mut self, prompt: Prompt) -> Self {
		self.prompt = prompt;

		self
	}

	/// Adds scopes to consent to during the same interaction.
	pub fn with_extra_scopes_to_consent(mut self, scopes: ScopeSet) -> Self {
		self.extra_scopes_to_consent = Some(scopes);

		self
	}

	/// Appends an authorize URL query parameter.
	pub fn with_extra_query_parameter(
		mut self,
		name: impl Into<String>,
		value: impl Into<String>,
	) -> Self {
		self.extra_query_parameters.push((name.into(), value.into()));

		self
	}
}

/// Outcome of a successful interactive acquisition.
#[derive(Clone, Debug)]
pub struct SignInResult {
	/// Account that signed in, as stored in the account store.
	pub account: Account,
	/// Token issued for the requested scopes.
	pub record: TokenRecord,
}

impl<C, M> Engine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Signs the user in through the interactive agent and returns the new token.
	///
	/// Cancelling the agent yields [`Error::UserCancelled`]. When the authority returns a
	/// different identity than the bound account, the returned identity wins.
	pub async fn acquire_interactive(&self, request: InteractiveRequest) -> Result<SignInResult> {
		const KIND: FlowKind = FlowKind::Interactive;

		let span = FlowSpan::new(KIND, "acquire_interactive");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.interactive(request)).await;

		common::transition(KIND, AcquisitionState::of(&result));
		self.metrics.record_result(&result);
		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	async fn interactive(&self, request: InteractiveRequest) -> Result<SignInResult> {
		const KIND: FlowKind = FlowKind::Interactive;

		common::transition(KIND, AcquisitionState::Resolving);
		common::ensure_scopes(&request.scopes)?;
		self.config.accept(&request.authority)?;

		let bound = match &request.account {
			Some(id) => self.accounts.get(id).await?,
			None => None,
		};
		let key = GuardKey::new(request.account.as_ref(), &request.authority);
		let _in_flight = common::try_flow_guard(self, &key)?;
		let consent_scope = match &request.extra_scopes_to_consent {
			Some(extra) => request.scopes.union(extra),
			None => request.scopes.clone(),
		};
		let login_hint = bound.as_ref().and_then(|a| a.username.as_deref());
		let session = AuthorizationSession::start(AuthorizeParams {
			authority: &request.authority,
			client_id: &self.config.client_id,
			redirect_uri: &self.redirect_uri,
			scope: &consent_scope,
			prompt: request.prompt,
			login_hint,
			extra_query_parameters: &request.extra_query_parameters,
		})?;

		common::transition(KIND, AcquisitionState::Exchanging);

		let outcome = self
			.agent
			.present(AgentRequest {
				authorization_url: session.authorize_url.clone(),
				redirect_uri: self.redirect_uri.clone(),
				login_hint: login_hint.map(str::to_owned),
			})
			.await;
		let redirect = match outcome {
			AgentOutcome::Redirected(url) => url,
			AgentOutcome::Cancelled => return Err(Error::UserCancelled),
			AgentOutcome::Failed { message } => return Err(AcquisitionError::Agent { message }.into()),
		};
		let code = session.complete(&redirect, self.strategy.as_ref())?;
		let facade = self.facade(&request.authority)?;

		self.metrics.record_exchange();

		let grant = facade
			.exchange_authorization_code(
				self.strategy.as_ref(),
				&code,
				session.pkce_verifier(),
				&request.scopes,
			)
			.await?;
		let account =
			auth::account_from_identity(grant.client_info.as_deref(), grant.id_token.as_deref())?;

		if let Some(expected) =
			request.account.as_ref().filter(|id| **id != account.home_account_id)
		{
			obs::warn_account_mismatch(expected, &account.home_account_id);
		}

		let record = common::record_from_grant(
			&account.home_account_id,
			&request.authority,
			&request.scopes,
			&grant,
		)?;

		self.accounts.upsert(account.clone()).await?;
		self.cache.store(record.clone()).await?;

		if let Some(refresh_token) = grant.refresh_token {
			self.cache
				.store_refresh_credential(RefreshCredential::new(
					account.home_account_id.clone(),
					request.authority.clone(),
					refresh_token,
				))
				.await?;
		}

		Ok(SignInResult { account, record })
	}
}
