//! Token acquisition engine: silent, interactive, and sign-out flows.

pub mod common;
pub mod interactive;
pub mod silent;

mod metrics;
mod sign_out;

pub use common::{AcquisitionState, GuardKey};
pub use interactive::*;
pub use metrics::AcquisitionMetrics;
pub use silent::*;

// self
use crate::{
	_prelude::*,
	agent::InteractiveAgent,
	auth::{Account, HomeAccountId},
	authority::Authority,
	cache::{AccountStore, TokenCache},
	config::ClientConfig,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{BasicFacade, ReqwestTransportErrorMapper, TransportErrorMapper},
	store::CacheStore,
	strategy::{DefaultProviderStrategy, ProviderStrategy},
};

/// Engine specialized for the crate's default reqwest transport stack.
pub type ReqwestEngine = Engine<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Acquires tokens for one public client registration.
///
/// The engine owns the configuration, the account and token views over a shared
/// [`CacheStore`], the interactive agent, and the token endpoint transport. It is the only
/// writer of the account store and token cache. Acquisitions for the same (account,
/// authority) pair never overlap: a second one fails fast with
/// [`Error::ConcurrentAcquisition`].
#[derive(Clone)]
pub struct Engine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Validated client configuration.
	pub config: Arc<ClientConfig>,
	/// Signed-in accounts.
	pub accounts: AccountStore,
	/// Issued tokens and refresh credentials.
	pub cache: TokenCache,
	/// Strategy that classifies token endpoint errors.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Agent that presents the authorization page.
	pub agent: Arc<dyn InteractiveAgent>,
	/// HTTP client wrapper used for every token request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Shared counters for acquisition outcomes.
	pub metrics: Arc<AcquisitionMetrics>,
	redirect_uri: Url,
	flow_guards: Arc<Mutex<HashMap<GuardKey, Arc<AsyncMutex<()>>>>>,
}
impl<C, M> Engine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an engine that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: ClientConfig,
		store: Arc<dyn CacheStore>,
		agent: Arc<dyn InteractiveAgent>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		config.validate()?;

		let redirect_uri = config.redirect_uri()?;

		Ok(Self {
			config: Arc::new(config),
			accounts: AccountStore::new(store.clone()),
			cache: TokenCache::new(store),
			strategy: Arc::new(DefaultProviderStrategy),
			agent,
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			metrics: Default::default(),
			redirect_uri,
			flow_guards: Default::default(),
		})
	}

	/// Replaces the provider strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Redirect URI used for every interactive acquisition.
	pub fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	/// Default authority of the configuration (the sign-up/sign-in flow for B2C clients).
	pub fn default_authority(&self) -> Result<Authority> {
		Ok(self.config.default_authority()?)
	}

	/// All signed-in accounts in the order they first signed in.
	pub async fn list_accounts(&self) -> Result<Vec<Account>> {
		self.accounts.list().await
	}

	/// Looks up a signed-in account.
	pub async fn account(&self, id: &HomeAccountId) -> Result<Option<Account>> {
		self.accounts.get(id).await
	}

	/// First signed-in account whose object id ends with `policy` (case-insensitive).
	pub async fn find_account_by_policy(&self, policy: &str) -> Result<Option<Account>> {
		self.accounts.find_by_policy(policy).await
	}

	fn facade(&self, authority: &Authority) -> Result<BasicFacade<C, M>> {
		BasicFacade::for_authority(
			authority,
			&self.config.client_id,
			&self.redirect_uri,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)
	}
}
impl Engine<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an engine with its own reqwest transport (30 second timeout).
	pub fn new(
		config: ClientConfig,
		store: Arc<dyn CacheStore>,
		agent: Arc<dyn InteractiveAgent>,
	) -> Result<Self> {
		Self::with_http_client(
			config,
			store,
			agent,
			ReqwestHttpClient::new()?,
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> Debug for Engine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Engine")
			.field("client_id", &self.config.client_id)
			.field("redirect_uri", &self.redirect_uri)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}
