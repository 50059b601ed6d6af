// self
use crate::{
	obs::{FlowKind, FlowOutcome},
	store::CompareAndSwapOutcome,
};

/// Increments `public_client_broker_flow_total{flow, outcome}` (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"public_client_broker_flow_total",
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Increments `public_client_broker_refresh_rotation_total{result}` after a silent refresh
/// tried to replace the account's refresh credential (when enabled).
///
/// `updated` is the normal case; `refresh_mismatch` and `missing` mean another writer or a
/// sign-out got there first.
pub fn record_refresh_rotation(outcome: CompareAndSwapOutcome) {
	let result = match outcome {
		CompareAndSwapOutcome::Updated => "updated",
		CompareAndSwapOutcome::RefreshMismatch => "refresh_mismatch",
		CompareAndSwapOutcome::Missing => "missing",
	};

	#[cfg(feature = "metrics")]
	metrics::counter!("public_client_broker_refresh_rotation_total", "result" => result)
		.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = result;
}
