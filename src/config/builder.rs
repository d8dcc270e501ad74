// self
use crate::{
	_prelude::*,
	auth::Secret,
	config::{self, ClientConfig, Environment},
	error::ConfigError,
};

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Raw API key; trimmed during validation.
	pub api_key: Secret,
	/// Optional raw private key; trimmed during validation, blank means absent.
	pub private_key: Option<Secret>,
	/// Hosted environment used when no explicit endpoint is set.
	pub environment: Environment,
	/// Explicit endpoint overriding the environment.
	pub endpoint: Option<Url>,
	/// `User-Agent` header value.
	pub user_agent: String,
	/// `Accept-Language` header value.
	pub language: String,
	/// Token lifetime before a refresh.
	pub token_ttl: Duration,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with the provided API key.
	pub fn new(api_key: impl Into<String>) -> Self {
		Self {
			api_key: Secret::new(api_key),
			private_key: None,
			environment: Environment::default(),
			endpoint: None,
			user_agent: ClientConfig::DEFAULT_USER_AGENT.into(),
			language: ClientConfig::DEFAULT_LANGUAGE.into(),
			token_ttl: ClientConfig::DEFAULT_TOKEN_TTL,
		}
	}

	/// Selects a hosted environment.
	pub fn environment(mut self, environment: Environment) -> Self {
		self.environment = environment;

		self
	}

	/// Overrides the endpoint (takes precedence over the environment).
	pub fn endpoint(mut self, url: Url) -> Self {
		self.endpoint = Some(url);

		self
	}

	/// Sets the hex-encoded private key used to derive one-time codes at login.
	pub fn private_key(mut self, key: impl Into<String>) -> Self {
		self.private_key = Some(Secret::new(key));

		self
	}

	/// Overrides the `User-Agent` header value.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Overrides the `Accept-Language` header value.
	pub fn language(mut self, language: impl Into<String>) -> Self {
		self.language = language.into();

		self
	}

	/// Overrides the token lifetime (defaults to 23 hours).
	pub fn token_ttl(mut self, ttl: Duration) -> Self {
		self.token_ttl = ttl;

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let api_key = self.api_key.expose().trim();

		if api_key.is_empty() {
			return Err(ConfigError::MissingApiKey);
		}

		let private_key = self
			.private_key
			.as_ref()
			.map(|key| key.expose().trim())
			.filter(|key| !key.is_empty())
			.map(Secret::from);
		let endpoint = match self.endpoint {
			Some(url) => url,
			None => Url::parse(self.environment.base_url())
				.map_err(|source| ConfigError::InvalidUrl { source })?,
		};
		let config = ClientConfig {
			endpoint,
			api_key: Secret::from(api_key),
			private_key,
			user_agent: self.user_agent,
			language: self.language,
			token_ttl: self.token_ttl,
		};

		config.validate()?;

		Ok(config)
	}
}

impl ClientConfig {
	/// Validates invariants for the config.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.endpoint.scheme() != "https" {
			return Err(ConfigError::InsecureEndpoint { url: self.endpoint.to_string() });
		}
		if let Some(key) = self.private_key.as_ref() {
			hex::decode(key.expose()).map_err(|source| ConfigError::InvalidPrivateKey { source })?;
		}
		if !self.token_ttl.is_positive() {
			return Err(ConfigError::NonPositiveTokenTtl);
		}

		config::header_value("user_agent", &self.user_agent)?;
		config::header_value("language", &self.language)?;

		Ok(())
	}
}
