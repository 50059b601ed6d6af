// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by engine operations.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("public_client_broker.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event for an acquisition state transition.
pub fn record_transition(kind: FlowKind, state: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::debug!(flow = kind.as_str(), state = %state, "acquisition state changed");

	#[cfg(not(feature = "tracing"))]
	let _ = (kind, state);
}

/// Emits a warn event when the identity that signed in differs from the bound account.
pub fn warn_account_mismatch(expected: &dyn Display, actual: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		expected = %expected,
		actual = %actual,
		"interactive sign-in returned a different account than the one requested"
	);

	#[cfg(not(feature = "tracing"))]
	let _ = (expected, actual);
}

/// Emits a warn event when a refresh credential rotation lost a race.
pub fn warn_refresh_rotation(outcome: &dyn Debug) {
	#[cfg(feature = "tracing")]
	tracing::warn!(outcome = ?outcome, "refresh credential rotation did not apply");

	#[cfg(not(feature = "tracing"))]
	let _ = outcome;
}
