//! Seam between the engine and whatever presents the authorization page to the user.
//!
//! The UI layer implements [`InteractiveAgent`]: it shows [`AgentRequest::authorization_url`]
//! (system browser, embedded web view, test script) and resolves once the authority redirects
//! to [`AgentRequest::redirect_uri`] or the user gives up.

// self
use crate::_prelude::*;

/// Boxed future returned by [`InteractiveAgent::present`].
pub type AgentFuture<'a> = Pin<Box<dyn Future<Output = AgentOutcome> + 'a + Send>>;

/// What the agent needs to drive one interactive sign-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentRequest {
	/// Fully formed authorize URL to open.
	pub authorization_url: Url,
	/// Redirect URI the authority will navigate to when done.
	pub redirect_uri: Url,
	/// Username hint of the bound account, if any.
	pub login_hint: Option<String>,
}

/// How an interactive hand-off ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentOutcome {
	/// The authority navigated to the redirect URI; the full URL including its query.
	Redirected(Url),
	/// The user dismissed the agent.
	Cancelled,
	/// The agent could not present the page.
	Failed {
		/// Agent-supplied message.
		message: String,
	},
}

/// Presents the authorization page and reports the redirect.
pub trait InteractiveAgent
where
	Self: Send + Sync,
{
	/// Shows the page described by `request` and resolves when the interaction ends.
	fn present(&self, request: AgentRequest) -> AgentFuture<'_>;
}
