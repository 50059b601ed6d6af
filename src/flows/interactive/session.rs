// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	authority::Authority,
	error::AcquisitionError,
	flows::interactive::Prompt,
	strategy::ProviderStrategy,
};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;
const PKCE_METHOD: &str = "S256";

/// Inputs for one authorize URL.
pub(crate) struct AuthorizeParams<'a> {
	pub(crate) authority: &'a Authority,
	pub(crate) client_id: &'a str,
	pub(crate) redirect_uri: &'a Url,
	pub(crate) scope: &'a ScopeSet,
	pub(crate) prompt: Prompt,
	pub(crate) login_hint: Option<&'a str>,
	pub(crate) extra_query_parameters: &'a [(String, String)],
}

/// Authorization Code + PKCE handshake state for one interactive acquisition.
#[derive(Clone)]
pub(crate) struct AuthorizationSession {
	pub(crate) state: String,
	pub(crate) authorize_url: Url,
	pkce: PkcePair,
}
impl AuthorizationSession {
	pub(crate) fn start(params: AuthorizeParams<'_>) -> Result<Self> {
		let state = random_string(STATE_LEN);
		let pkce = PkcePair::generate();
		let authorize_url = build_authorize_url(&params, &state, &pkce)?;

		Ok(Self { state, authorize_url, pkce })
	}

	pub(crate) fn pkce_verifier(&self) -> &str {
		&self.pkce.verifier
	}

	/// Extracts the authorization code from the redirect the agent observed.
	///
	/// The `state` must round-trip; an OAuth error is either a user cancellation (as decided
	/// by the strategy) or an authorization failure.
	pub(crate) fn complete(
		&self,
		redirect: &Url,
		strategy: &dyn ProviderStrategy,
	) -> Result<String> {
		let params = redirect.query_pairs().into_owned().collect::<HashMap<_, _>>();

		if params.get("state").map(String::as_str) != Some(self.state.as_str()) {
			return Err(AcquisitionError::StateMismatch.into());
		}
		if let Some(error) = params.get("error") {
			let description = params.get("error_description").cloned();

			if strategy.is_user_cancellation(error, description.as_deref()) {
				return Err(Error::UserCancelled);
			}

			return Err(AcquisitionError::Authorization { error: error.clone(), description }.into());
		}

		params
			.get("code")
			.filter(|code| !code.is_empty())
			.cloned()
			.ok_or_else(|| AcquisitionError::MissingAuthorizationCode.into())
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("state", &self.state)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge", &self.pkce.challenge)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge }
	}
}

fn build_authorize_url(
	params: &AuthorizeParams<'_>,
	state: &str,
	pkce: &PkcePair,
) -> Result<Url> {
	let mut url = params.authority.authorization_endpoint()?;
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", params.client_id);
	pairs.append_pair("redirect_uri", params.redirect_uri.as_str());
	pairs.append_pair("scope", &params.scope.with_reserved().normalized());
	pairs.append_pair("state", state);
	pairs.append_pair("prompt", params.prompt.as_str());

	if let Some(hint) = params.login_hint {
		pairs.append_pair("login_hint", hint);
	}

	pairs.append_pair("client_info", "1");
	pairs.append_pair("code_challenge", &pkce.challenge);
	pairs.append_pair("code_challenge_method", PKCE_METHOD);

	for (name, value) in params.extra_query_parameters {
		pairs.append_pair(name, value);
	}

	drop(pairs);

	Ok(url)
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(verifier.as_bytes());
	let digest = hasher.finalize();
	URL_SAFE_NO_PAD.encode(digest)
}
