//! Bearer-authenticated GET helper for calling protected resources.

// crates.io
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::ConfigError, http::DEFAULT_TIMEOUT};

const BODY_PREVIEW_LEN: usize = 256;

/// Failures raised by [`ResourceClient`].
#[derive(Debug, ThisError)]
pub enum HttpError {
	/// The request never produced a response (connect, TLS, timeout).
	#[error("Resource request failed.")]
	Network {
		/// Underlying transport failure.
		#[source]
		source: ReqwestError,
	},
	/// The resource answered with a non-success status.
	#[error("Resource responded with HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Leading part of the response body.
		body_preview: String,
	},
	/// The body is not the expected JSON.
	#[error("Resource response is not valid JSON at `{path}`.", path = .source.path())]
	InvalidJson {
		/// Structured parsing failure including the failing JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl HttpError {
	/// Returns `true` for timeouts, connection failures, throttling, and server errors.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Network { source } => source.is_timeout() || source.is_connect(),
			Self::Status { status, .. } => *status == 429 || *status >= 500,
			Self::InvalidJson { .. } => false,
		}
	}
}

/// Thin reqwest wrapper that performs one bearer GET per call, without retries.
#[derive(Clone, Debug)]
pub struct ResourceClient {
	client: ReqwestClient,
}
impl ResourceClient {
	/// Builds a client with a 30 second request timeout.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().timeout(DEFAULT_TIMEOUT).build()?;

		Ok(Self { client })
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client }
	}

	/// GETs `url` with `Authorization: Bearer {token}` and parses the body as JSON.
	pub async fn fetch_with_bearer(
		&self,
		url: &Url,
		token: impl AsRef<str>,
	) -> Result<serde_json::Value, HttpError> {
		self.fetch_json(url, token).await
	}

	/// GETs `url` with a bearer token and deserializes the JSON body into `T`.
	pub async fn fetch_json<T>(&self, url: &Url, token: impl AsRef<str>) -> Result<T, HttpError>
	where
		T: DeserializeOwned,
	{
		let response = self
			.client
			.get(url.clone())
			.header(AUTHORIZATION, format!("Bearer {}", token.as_ref()))
			.header(ACCEPT, "application/json")
			.send()
			.await
			.map_err(|source| HttpError::Network { source })?;
		let status = response.status();
		let body = response.bytes().await.map_err(|source| HttpError::Network { source })?;

		if !status.is_success() {
			return Err(HttpError::Status {
				status: status.as_u16(),
				body_preview: preview(&body),
			});
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| HttpError::InvalidJson { source })
	}
}

fn preview(body: &[u8]) -> String {
	String::from_utf8_lossy(body).chars().take(BODY_PREVIEW_LEN).collect()
}
