//! Token acquisition core for public OAuth 2.0 clients on Azure AD and Azure AD B2C.
//!
//! The [`flows::Engine`] drives interactive authorization-code + PKCE sign-in through a
//! caller-supplied [`agent::InteractiveAgent`], silent refresh with a typed
//! interaction-required fallback, and sign-out with cascade eviction. Accounts and tokens
//! live behind the [`store::CacheStore`] contract and are read through the
//! [`cache::AccountStore`] and [`cache::TokenCache`] views.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod agent;
pub mod auth;
pub mod authority;
pub mod cache;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod resource;
pub mod session;
pub mod store;
pub mod strategy;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, hash_map::DefaultHasher},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
