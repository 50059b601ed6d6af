//! Silent acquisition: cache lookup, then a refresh-token exchange.
//!
//! Never involves the interactive agent. When the authority (or the local cache) says the
//! user must interact, [`Error::InteractionRequired`] carries the bound account so the caller
//! can start [`Engine::acquire_interactive`] for the same identity.

// self
use crate::{
	_prelude::*,
	auth::{HomeAccountId, RefreshCredential, ScopeSet, TokenRecord},
	authority::Authority,
	flows::{
		Engine,
		common::{self, AcquisitionState, GuardKey},
	},
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::CompareAndSwapOutcome,
};

/// Parameters for [`Engine::acquire_silent`].
#[derive(Clone, Debug)]
pub struct SilentRequest {
	/// Account the token is for.
	pub account: HomeAccountId,
	/// Authority that issued the account's refresh credential.
	pub authority: Authority,
	/// Scopes the access token must cover.
	pub scopes: ScopeSet,
	/// Skips the cache and always exchanges the refresh credential.
	pub force_refresh: bool,
}
impl SilentRequest {
	/// Creates a request that may be answered from the cache.
	pub fn new(account: HomeAccountId, authority: Authority, scopes: ScopeSet) -> Self {
		Self { account, authority, scopes, force_refresh: false }
	}

	/// Forces a refresh-token exchange.
	pub fn force_refresh(mut self) -> Self {
		self.force_refresh = true;

		self
	}
}

impl<C, M> Engine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns a valid token for the account without user interaction.
	///
	/// Two calls against an unexpired cached record return the same record with no network
	/// traffic. Nothing is retried.
	pub async fn acquire_silent(&self, request: SilentRequest) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Silent;

		let span = FlowSpan::new(KIND, "acquire_silent");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.silent(request)).await;

		common::transition(KIND, AcquisitionState::of(&result));
		self.metrics.record_result(&result);
		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	async fn silent(&self, request: SilentRequest) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Silent;

		let SilentRequest { account, authority, scopes, force_refresh } = request;

		common::transition(KIND, AcquisitionState::Resolving);
		common::ensure_scopes(&scopes)?;
		self.config.accept(&authority)?;

		if self.accounts.get(&account).await?.is_none() {
			return Err(Error::AccountNotFound { account });
		}

		let key = GuardKey::new(Some(&account), &authority);
		let _in_flight = common::try_flow_guard(self, &key)?;

		let cached = if force_refresh {
			None
		} else {
			self.cache.lookup(&account, &authority, &scopes).await?
		};

		if let Some(record) = cached {
			common::transition(KIND, AcquisitionState::CacheHit);
			self.metrics.record_cache_hit();
			obs::record_flow_outcome(KIND, FlowOutcome::CacheHit);

			return Ok(record);
		}

		common::transition(KIND, AcquisitionState::Exchanging);

		let credential = self.usable_refresh_credential(&account, &authority).await?;
		let facade = self.facade(&authority)?;

		self.metrics.record_exchange();

		let grant = match facade
			.refresh_token(self.strategy.as_ref(), credential.secret.expose(), &scopes)
			.await
		{
			Ok(grant) => grant,
			Err(e) if e.is_interaction_required() => {
				self.cache.revoke_refresh_credential(&account, &authority).await?;

				return Err(e.bind_account(&account));
			},
			Err(e) => return Err(e),
		};
		let record = common::record_from_grant(&account, &authority, &scopes, &grant)?;

		self.cache.store(record.clone()).await?;

		if let Some(rotated) = grant.refresh_token {
			let replacement = RefreshCredential::new(account, authority, rotated);
			let outcome = self.cache.rotate_refresh_credential(&credential, replacement).await?;

			obs::record_refresh_rotation(outcome);

			if outcome != CompareAndSwapOutcome::Updated {
				obs::warn_refresh_rotation(&outcome);
			}
		}

		Ok(record)
	}

	async fn usable_refresh_credential(
		&self,
		account: &HomeAccountId,
		authority: &Authority,
	) -> Result<RefreshCredential> {
		let reason = match self.cache.refresh_credential(account, authority).await? {
			Some(credential) if !credential.is_revoked() => return Ok(credential),
			Some(_) => "the refresh credential was revoked",
			None => "no refresh credential is cached for this authority",
		};

		Err(Error::InteractionRequired { account: Some(account.clone()), reason: reason.into() })
	}
}
