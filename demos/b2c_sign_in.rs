//! Signs a user in against an Azure AD B2C sign-up/sign-in policy, then acquires the same
//! token silently and (optionally) calls a protected API with it.
//!
//! The agent prints the authorize URL and waits for the redirect URL to be pasted back, which
//! is enough to try the flow with a browser and a registered `msauth.{app}://auth` redirect.
//! Set `HELLO_API_URL` to call a protected resource with the acquired token.

// std
use std::{
	env,
	io::{self, Write},
	sync::Arc,
};
// crates.io
use color_eyre::Result;
use url::Url;
// self
use public_client_broker::{
	agent::{AgentFuture, AgentOutcome, AgentRequest, InteractiveAgent},
	config::{B2cPolicies, ClientConfig},
	flows::{Engine, InteractiveRequest, SilentRequest},
	resource::ResourceClient,
	session::Session,
	store::{CacheStore, FileStore},
};

struct TerminalAgent;
impl InteractiveAgent for TerminalAgent {
	fn present(&self, request: AgentRequest) -> AgentFuture<'_> {
		Box::pin(async move {
			println!("Open this URL in a browser and sign in:\n\n{}\n", request.authorization_url);
			print!("Paste the {} redirect URL (empty to cancel): ", request.redirect_uri.scheme());

			if io::stdout().flush().is_err() {
				return AgentOutcome::Failed { message: "stdout is closed".into() };
			}

			let mut line = String::new();

			match io::stdin().read_line(&mut line) {
				Ok(_) if line.trim().is_empty() => AgentOutcome::Cancelled,
				Ok(_) => match Url::parse(line.trim()) {
					Ok(url) => AgentOutcome::Redirected(url),
					Err(e) => AgentOutcome::Failed { message: e.to_string() },
				},
				Err(e) => AgentOutcome::Failed { message: e.to_string() },
			}
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = ClientConfig::builder("90c0fe63-bcf2-44d5-8fb7-b8bbc0b29dc6")
		.app_identifier("com.example.fabrikam")
		.authority_host("fabrikamb2c.b2clogin.com")
		.tenant("fabrikamb2c.onmicrosoft.com")
		.policies(B2cPolicies::new("b2c_1_susi")?.with_edit_profile("b2c_1_edit_profile")?)
		.scopes(["https://fabrikamb2c.onmicrosoft.com/helloapi/demo.read"])
		.build()?;
	let store: Arc<dyn CacheStore> =
		Arc::new(FileStore::open(env::temp_dir().join("public-client-broker-demo.json"))?);
	let engine = Engine::new(config, store, Arc::new(TerminalAgent))?;
	let authority = engine.default_authority()?;
	let scopes = engine.config.default_scopes()?;
	let mut session = Session::default();

	match engine.find_account_by_policy("b2c_1_susi").await? {
		Some(account) => {
			println!("Found cached account {}.", account.home_account_id);

			let request =
				SilentRequest::new(account.home_account_id.clone(), authority.clone(), scopes.clone());

			match engine.acquire_silent(request).await {
				Ok(record) => session.apply(account, record),
				Err(e) if e.is_interaction_required() => {
					println!("Silent acquisition needs interaction: {e}");

					let result = engine
						.acquire_interactive(
							InteractiveRequest::new(authority.clone(), scopes.clone())
								.with_account(account.home_account_id),
						)
						.await?;

					session.apply(result.account, result.record);
				},
				Err(e) => return Err(e.into()),
			}
		},
		None => {
			let result =
				engine.acquire_interactive(InteractiveRequest::new(authority, scopes)).await?;

			session.apply(result.account, result.record);
		},
	}

	if let Some(account) = session.account() {
		println!(
			"Signed in as {} (policy {}).",
			account.username.as_deref().unwrap_or("<unknown>"),
			account.policy_tag.as_deref().unwrap_or("<none>")
		);
	}
	if let (Ok(api), Some(token)) = (env::var("HELLO_API_URL"), session.access_token()) {
		let body = ResourceClient::new()?.fetch_with_bearer(&Url::parse(&api)?, token).await?;

		println!("{body:#}");
	}

	println!("{} account(s) cached; {:?}.", engine.list_accounts().await?.len(), engine.metrics);

	Ok(())
}
