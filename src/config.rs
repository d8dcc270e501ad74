//! Client configuration shared by the session manager and request executor.
//!
//! A [`ClientConfig`] is assembled through [`ClientConfig::builder`] and validated once, so
//! every value that ends up in a header or URL is known to be well-formed before the first
//! request leaves the process.

/// Builder API for assembling client configs.
pub mod builder;

pub use builder::*;

// crates.io
use http::{
	HeaderMap, HeaderValue,
	header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT},
};
// self
use crate::{_prelude::*, auth::Secret, error::ConfigError};

/// Media type of login and default request bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Hosted API environments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
	#[default]
	/// Live environment.
	Production,
	/// Sandbox environment used for integration testing.
	Beta,
}
impl Environment {
	/// Returns the base URL for the environment.
	pub const fn base_url(self) -> &'static str {
		match self {
			Self::Production => "https://api.twikey.com",
			Self::Beta => "https://api.beta.twikey.com",
		}
	}
}

/// Immutable client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Base URL every request path is appended to.
	pub endpoint: Url,
	/// Creditor API key sent as `apiToken` during login.
	pub api_key: Secret,
	/// Hex-encoded private key enabling one-time codes at login.
	pub private_key: Option<Secret>,
	/// `User-Agent` header value.
	pub user_agent: String,
	/// `Accept-Language` header value.
	pub language: String,
	/// Age after which the bearer token is refreshed.
	pub token_ttl: Duration,
}
impl ClientConfig {
	/// Default `User-Agent` header value.
	pub const DEFAULT_USER_AGENT: &'static str =
		concat!("twikey-rust/v", env!("CARGO_PKG_VERSION"));
	/// Default `Accept-Language` header value.
	pub const DEFAULT_LANGUAGE: &'static str = "en";
	/// Default token lifetime.
	pub const DEFAULT_TOKEN_TTL: Duration = Duration::hours(23);

	/// Creates a new builder for the provided API key.
	pub fn builder(api_key: impl Into<String>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(api_key)
	}

	/// Joins a request path (optionally carrying a query string) onto the endpoint.
	pub fn url_for(&self, path: &str) -> Result<Url> {
		let base = self.endpoint.as_str().trim_end_matches('/');
		let path = path.trim_start_matches('/');

		Url::parse(&format!("{base}/{path}"))
			.map_err(|source| ConfigError::InvalidUrl { source }.into())
	}

	/// Headers attached to every call before caller overrides are applied.
	pub fn default_headers(&self) -> Result<HeaderMap, ConfigError> {
		let mut headers = HeaderMap::new();

		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
		headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
		headers.insert(USER_AGENT, header_value("user_agent", &self.user_agent)?);
		headers.insert(ACCEPT_LANGUAGE, header_value("language", &self.language)?);

		Ok(headers)
	}
}

pub(crate) fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ConfigError> {
	HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeaderValue { name })
}
