//! Shared helpers for flow implementations (state labels, in-flight guards, record building).

// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{
	_prelude::*,
	auth::{HomeAccountId, ScopeSet, TokenRecord, TokenRecordBuilderError},
	authority::Authority,
	error::ConfigError,
	flows::Engine,
	http::TokenHttpClient,
	oauth::{TokenGrant, TransportErrorMapper},
	obs::{self, FlowKind},
};

/// States an acquisition moves through.
///
/// `Idle → Resolving → (CacheHit | Exchanging) → (Succeeded | InteractionRequired | Failed)`.
/// Every transition is emitted as a debug tracing event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AcquisitionState {
	/// Nothing in flight.
	Idle,
	/// Validating the request against the configuration, accounts, and guards.
	Resolving,
	/// A cached record satisfied the request.
	CacheHit,
	/// Talking to the user agent and/or the token endpoint.
	Exchanging,
	/// A token was returned.
	Succeeded,
	/// Silent acquisition must fall back to interaction.
	InteractionRequired,
	/// Any other failure.
	Failed,
}
impl AcquisitionState {
	/// Terminal state for a finished acquisition.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => Self::Succeeded,
			Err(e) if e.is_interaction_required() => Self::InteractionRequired,
			Err(_) => Self::Failed,
		}
	}
}
impl Display for AcquisitionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(match self {
			Self::Idle => "idle",
			Self::Resolving => "resolving",
			Self::CacheHit => "cache_hit",
			Self::Exchanging => "exchanging",
			Self::Succeeded => "succeeded",
			Self::InteractionRequired => "interaction_required",
			Self::Failed => "failed",
		})
	}
}

/// Key of the per-(account, authority) in-flight guard.
///
/// Interactive acquisitions without a bound account use `account: None`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GuardKey {
	/// Bound account, if any.
	pub account: Option<HomeAccountId>,
	/// Authority the acquisition targets.
	pub authority: Authority,
}
impl GuardKey {
	/// Creates a key for the provided pair.
	pub fn new(account: Option<&HomeAccountId>, authority: &Authority) -> Self {
		Self { account: account.cloned(), authority: authority.clone() }
	}
}
impl Display for GuardKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match &self.account {
			Some(account) => write!(f, "{account}@{}", self.authority),
			None => write!(f, "<unbound>@{}", self.authority),
		}
	}
}

/// Emits a state transition event for the flow.
pub(crate) fn transition(kind: FlowKind, state: AcquisitionState) {
	obs::record_transition(kind, &state);
}

/// Claims the in-flight guard for `key`, failing fast when another acquisition holds it.
///
/// Dropping the returned guard (including by dropping the acquisition future) releases it.
pub(crate) fn try_flow_guard<C, M>(
	engine: &Engine<C, M>,
	key: &GuardKey,
) -> Result<MutexGuardArc<()>>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let guard = claim_guard(&mut engine.flow_guards.lock(), key);

	guard.try_lock_arc().ok_or_else(|| Error::ConcurrentAcquisition { key: key.to_string() })
}

/// Returns the lock for `key`, dropping idle entries first.
///
/// A held guard keeps a second reference to its lock, so only locks nobody holds are dropped
/// and the map never outgrows the acquisitions in flight.
fn claim_guard(
	guards: &mut HashMap<GuardKey, Arc<AsyncMutex<()>>>,
	key: &GuardKey,
) -> Arc<AsyncMutex<()>> {
	guards.retain(|_, lock| Arc::strong_count(lock) > 1);
	guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

/// Rejects requests that carry no scopes.
pub(crate) fn ensure_scopes(scopes: &ScopeSet) -> Result<()> {
	if scopes.is_empty() { Err(ConfigError::EmptyScopes.into()) } else { Ok(()) }
}

/// Turns a token grant into the record stored under the requested scopes.
///
/// Records are keyed by the requested scopes without the reserved OpenID Connect scopes so
/// later lookups for the same request hit regardless of how the authority echoes scopes.
pub(crate) fn record_from_grant(
	account: &HomeAccountId,
	authority: &Authority,
	requested: &ScopeSet,
	grant: &TokenGrant,
) -> Result<TokenRecord> {
	let mut builder =
		TokenRecord::builder(account.clone(), authority.clone(), requested.without_reserved())
			.access_token(grant.access_token.clone())
			.issued_at(grant.received_at)
			.expires_in(grant.expires_in);

	if let Some(id_token) = &grant.id_token {
		builder = builder.id_token(id_token.clone());
	}

	builder.build().map_err(map_token_builder_error)
}

/// Normalizes token builder errors into broker errors.
pub(crate) fn map_token_builder_error(err: TokenRecordBuilderError) -> Error {
	ConfigError::from(err).into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn guard_key_renders_unbound_accounts() {
		let authority = Authority::aad("login.microsoftonline.com", "common")
			.expect("Authority fixture should be valid.");
		let account = HomeAccountId::new("uid.utid").expect("Account fixture should be valid.");

		assert_eq!(
			GuardKey::new(None, &authority).to_string(),
			"<unbound>@https://login.microsoftonline.com/common"
		);
		assert_eq!(
			GuardKey::new(Some(&account), &authority).to_string(),
			"uid.utid@https://login.microsoftonline.com/common"
		);
	}

	#[test]
	fn released_guards_are_pruned() {
		let authority = Authority::aad("login.microsoftonline.com", "common")
			.expect("Authority fixture should be valid.");
		let ada = HomeAccountId::new("ada.utid").expect("Account fixture should be valid.");
		let bob = HomeAccountId::new("bob.utid").expect("Account fixture should be valid.");
		let ada_key = GuardKey::new(Some(&ada), &authority);
		let bob_key = GuardKey::new(Some(&bob), &authority);
		let mut guards = HashMap::new();
		let held = claim_guard(&mut guards, &ada_key)
			.try_lock_arc()
			.expect("A fresh lock should be free.");

		assert!(claim_guard(&mut guards, &ada_key).try_lock_arc().is_none());

		drop(claim_guard(&mut guards, &bob_key));

		assert_eq!(guards.len(), 2);

		drop(claim_guard(&mut guards, &ada_key));

		assert!(guards.contains_key(&ada_key), "A held guard must survive pruning.");
		assert!(!guards.contains_key(&bob_key));

		drop(held);

		let next = claim_guard(&mut guards, &bob_key)
			.try_lock_arc()
			.expect("A released key should be claimable again.");

		assert_eq!(guards.len(), 1);
		assert!(guards.contains_key(&bob_key));

		drop(next);
	}

	#[test]
	fn terminal_state_follows_result() {
		assert_eq!(AcquisitionState::of(&Ok::<_, Error>(())), AcquisitionState::Succeeded);
		assert_eq!(
			AcquisitionState::of::<()>(&Err(Error::InteractionRequired {
				account: None,
				reason: "invalid_grant".into(),
			})),
			AcquisitionState::InteractionRequired
		);
		assert_eq!(AcquisitionState::of::<()>(&Err(Error::UserCancelled)), AcquisitionState::Failed);
	}

	#[test]
	fn empty_scopes_are_rejected() {
		let empty = ScopeSet::new(Vec::<&str>::new()).expect("Empty scope set should build.");

		assert!(matches!(ensure_scopes(&empty), Err(Error::Config(ConfigError::EmptyScopes))));
	}
}
