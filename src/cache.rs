//! Account registry and token cache views over a shared [`CacheStore`].
//!
//! Both views are cheap to clone and only mutate the backend through the engine and
//! sign-out paths.

pub mod accounts;
pub mod tokens;

pub use accounts::AccountStore;
pub use tokens::TokenCache;
