//! Sign-out with cascade eviction of the account's tokens and refresh credentials.

// self
use crate::{
	_prelude::*,
	auth::{Account, HomeAccountId},
	flows::Engine,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> Engine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Removes the account and, by cascade, every token record and refresh credential it
	/// owns. Returns the removed account.
	///
	/// Local only; the authority's browser session is left untouched. An acquisition still in
	/// flight for the account fails with [`Error::AccountNotFound`] instead of writing tokens.
	pub async fn sign_out(&self, account: &HomeAccountId) -> Result<Account> {
		const KIND: FlowKind = FlowKind::SignOut;

		let span = FlowSpan::new(KIND, "sign_out");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.accounts.remove(account)).await;

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}
}
