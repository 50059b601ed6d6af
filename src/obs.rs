//! Optional observability helpers for acquisition flows.
//!
//! # Feature Flags
//!
//! - `tracing` (default) emits spans named `public_client_broker.flow` with `flow` and `stage`
//!   fields, debug events for every acquisition state transition, and warn events for
//!   anomalies such as an interactive sign-in returning a different account.
//! - `metrics` increments the `public_client_broker_flow_total` counter labeled by `flow` and
//!   `outcome`, and `public_client_broker_refresh_rotation_total` labeled by the `result` of
//!   each refresh credential rotation.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Acquisition flows observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Cache lookup followed by a refresh-token exchange.
	Silent,
	/// Authorization Code + PKCE through the interactive agent.
	Interactive,
	/// Account removal with cascade eviction.
	SignOut,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Silent => "silent",
			FlowKind::Interactive => "interactive",
			FlowKind::SignOut => "sign_out",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an engine operation.
	Attempt,
	/// A cached token satisfied the request.
	CacheHit,
	/// A token exchange (or sign-out) completed.
	Success,
	/// Silent acquisition must fall back to interaction.
	InteractionRequired,
	/// The user cancelled the interactive agent.
	Cancelled,
	/// Another acquisition for the same account and authority was in flight.
	Concurrent,
	/// The account was unknown or signed out before the operation finished.
	AccountNotFound,
	/// Any other failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::CacheHit => "cache_hit",
			FlowOutcome::Success => "success",
			FlowOutcome::InteractionRequired => "interaction_required",
			FlowOutcome::Cancelled => "cancelled",
			FlowOutcome::Concurrent => "concurrent",
			FlowOutcome::AccountNotFound => "account_not_found",
			FlowOutcome::Failure => "failure",
		}
	}

	/// Outcome label for a finished operation.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => FlowOutcome::Success,
			Err(Error::InteractionRequired { .. }) => FlowOutcome::InteractionRequired,
			Err(Error::UserCancelled) => FlowOutcome::Cancelled,
			Err(Error::ConcurrentAcquisition { .. }) => FlowOutcome::Concurrent,
			Err(Error::AccountNotFound { .. }) => FlowOutcome::AccountNotFound,
			Err(_) => FlowOutcome::Failure,
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
