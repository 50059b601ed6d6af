//! Shared fixtures for integration tests: an `httpmock`-backed authority, a scripted
//! interactive agent, and unsigned identity payloads.

#![allow(dead_code)]

pub use std::{collections::HashMap, sync::Arc};

pub use httpmock::prelude::*;
pub use public_client_broker::{
	agent::{AgentFuture, AgentOutcome, AgentRequest, InteractiveAgent},
	auth::{Account, HomeAccountId, RefreshCredential, ScopeSet, TokenRecord},
	authority::Authority,
	config::{B2cPolicies, ClientConfig},
	error::{AcquisitionError, Error, Result},
	flows::{Engine, InteractiveRequest, ReqwestEngine, SilentRequest},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	reqwest::Client as ReqwestClient,
	store::{CacheStore, MemoryStore},
	url::Url,
};
pub use time::{Duration, OffsetDateTime};

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use serde_json::{Value, json};

pub const CLIENT_ID: &str = "client-123";
pub const TENANT: &str = "fabrikamb2c.onmicrosoft.com";
pub const SUSI: &str = "b2c_1_susi";
pub const EDIT_PROFILE: &str = "b2c_1_edit_profile";
pub const API_SCOPE: &str = "https://fabrikamb2c.onmicrosoft.com/helloapi/demo.read";
pub const UID: &str = "90c0fe63-bcf2-44d5-8fb7-b8bbc0b29dc6-b2c_1_susi";
pub const UTID: &str = "775527ff-9a37-4307-8b3d-cc311f58d925";

/// Builds a reqwest client that accepts the self-signed certificates `httpmock` serves.
pub fn insecure_reqwest_client() -> ReqwestClient {
	ReqwestClient::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.")
}

/// B2C configuration whose authority host is the mock server.
pub fn b2c_config(server: &MockServer) -> ClientConfig {
	ClientConfig::builder(CLIENT_ID)
		.app_identifier("com.example.app")
		.authority_host(format!("127.0.0.1:{}", server.port()))
		.tenant(TENANT)
		.policies(
			B2cPolicies::new(SUSI)
				.and_then(|p| p.with_edit_profile(EDIT_PROFILE))
				.expect("Policy fixtures should be valid."),
		)
		.scopes([API_SCOPE])
		.build()
		.expect("Client configuration fixture should build.")
}

/// Token path of a B2C policy authority on the mock server.
pub fn token_path(policy: &str) -> String {
	format!("/tfp/{TENANT}/{policy}/oauth2/v2.0/token")
}

/// Engine over an in-memory store, the scripted agent, and the insecure transport.
pub fn build_engine(
	server: &MockServer,
	agent: Arc<ScriptedAgent>,
) -> (ReqwestEngine, Arc<MemoryStore>) {
	let backend = Arc::new(MemoryStore::default());
	let store: Arc<dyn CacheStore> = backend.clone();
	let engine = ReqwestEngine::with_http_client(
		b2c_config(server),
		store,
		agent,
		ReqwestHttpClient::with_client(insecure_reqwest_client()),
		ReqwestTransportErrorMapper,
	)
	.expect("Engine fixture should build.");

	(engine, backend)
}

pub fn scopes(values: &[&str]) -> ScopeSet {
	ScopeSet::new(values.iter().copied()).expect("Scope fixture should be valid.")
}

pub fn home_account_id() -> HomeAccountId {
	HomeAccountId::new(format!("{UID}.{UTID}")).expect("Account fixture should be valid.")
}

fn encode(value: &Value) -> String {
	URL_SAFE_NO_PAD.encode(value.to_string())
}

pub fn client_info(uid: &str, utid: &str) -> String {
	encode(&json!({ "uid": uid, "utid": utid }))
}

/// Unsigned compact JWT carrying `claims`.
pub fn id_token(claims: Value) -> String {
	format!("{}.{}.", encode(&json!({ "alg": "none", "typ": "JWT" })), encode(&claims))
}

/// Successful token response for the fixture account.
pub fn token_response(access: &str, refresh: Option<&str>, expires_in: i64) -> Value {
	let mut body = json!({
		"access_token": access,
		"token_type": "Bearer",
		"expires_in": expires_in,
		"scope": API_SCOPE,
		"client_info": client_info(UID, UTID),
		"id_token": id_token(json!({
			"oid": UID,
			"tid": UTID,
			"emails": ["ada@example.com"],
			"name": "Ada Lovelace",
		})),
	});

	if let Some(refresh) = refresh {
		body["refresh_token"] = json!(refresh);
	}

	body
}

/// What the scripted agent does when presented with an authorize URL.
#[derive(Clone, Debug)]
pub enum Script {
	/// Redirect with the code and the echoed state.
	Code(&'static str),
	/// Redirect with an OAuth error and the echoed state.
	OAuthError { error: &'static str, description: &'static str },
	/// Redirect with a forged state.
	ForgedState,
	/// User closes the agent.
	Cancel,
}

/// Interactive agent that answers from a script and records what it was shown.
#[derive(Debug)]
pub struct ScriptedAgent {
	script: Script,
	requests: Mutex<Vec<AgentRequest>>,
}
impl ScriptedAgent {
	pub fn new(script: Script) -> Arc<Self> {
		Arc::new(Self { script, requests: Mutex::new(Vec::new()) })
	}

	pub fn requests(&self) -> Vec<AgentRequest> {
		self.requests.lock().clone()
	}

	/// Query parameters of the most recent authorize URL.
	pub fn last_authorize_params(&self) -> HashMap<String, String> {
		self.requests
			.lock()
			.last()
			.map(|r| r.authorization_url.query_pairs().into_owned().collect())
			.unwrap_or_default()
	}

	fn outcome_for(&self, request: &AgentRequest) -> AgentOutcome {
		let state = request
			.authorization_url
			.query_pairs()
			.find(|(k, _)| k == "state")
			.map(|(_, v)| v.into_owned())
			.unwrap_or_default();
		let mut redirect = request.redirect_uri.clone();

		match &self.script {
			Script::Code(code) => {
				redirect.query_pairs_mut().append_pair("code", code).append_pair("state", &state);
			},
			Script::OAuthError { error, description } => {
				redirect
					.query_pairs_mut()
					.append_pair("error", error)
					.append_pair("error_description", description)
					.append_pair("state", &state);
			},
			Script::ForgedState => {
				redirect.query_pairs_mut().append_pair("code", "stolen").append_pair("state", "forged");
			},
			Script::Cancel => return AgentOutcome::Cancelled,
		}

		AgentOutcome::Redirected(redirect)
	}
}
impl InteractiveAgent for ScriptedAgent {
	fn present(&self, request: AgentRequest) -> AgentFuture<'_> {
		let outcome = self.outcome_for(&request);

		self.requests.lock().push(request);

		Box::pin(async move { outcome })
	}
}
