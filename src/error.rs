//! Client-level error types shared across sessions, requests, feeds, and signature checks.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used for foreign failure sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Feed payload could not be classified or parsed.
	#[error(transparent)]
	Decoding(#[from] DecodingError),

	/// Login was rejected or the session can no longer be used.
	#[error("Authentication failed: {message}.")]
	Authentication {
		/// Server- or client-supplied message.
		message: String,
	},
	/// The API rejected the request with a structured 400 response.
	#[error("Request rejected with `{code}`: {message}.")]
	Domain {
		/// Machine-readable error code, e.g. `err_invalid_params`.
		code: String,
		/// Human-readable message returned by the API.
		message: String,
	},
	/// Any other HTTP failure or malformed response shape.
	#[error("Unexpected API response: {reason}.")]
	Protocol {
		/// HTTP reason phrase or a short description of the malformed shape.
		reason: String,
	},
	/// A presented signature did not match the computed one.
	#[error("Signature verification failed: {message}.")]
	Authorization {
		/// Description of the failed check.
		message: String,
	},
	/// A caller-supplied feed handler failed; the drain was aborted.
	#[error("Feed handler failed.")]
	Handler {
		/// Failure reported by the handler.
		#[source]
		source: BoxError,
	},
}
impl Error {
	/// Code used for 400 responses whose body is not the documented JSON envelope.
	pub const UNKNOWN_CODE: &'static str = "err_unknown";

	/// Wraps a handler failure.
	pub fn handler(src: impl Into<BoxError>) -> Self {
		Self::Handler { source: src.into() }
	}

	pub(crate) fn protocol(reason: impl Into<String>) -> Self {
		Self::Protocol { reason: reason.into() }
	}

	pub(crate) fn authentication(message: impl Into<String>) -> Self {
		Self::Authentication { message: message.into() }
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// Endpoint or request path cannot be joined into a URL.
	#[error("Request URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoint must use HTTPS.
	#[error("The API endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// API key is blank after trimming.
	#[error("API key must not be empty.")]
	MissingApiKey,
	/// Private key is not hex encoded.
	#[error("Private key must be hex encoded.")]
	InvalidPrivateKey {
		/// Underlying decoding failure.
		#[source]
		source: hex::FromHexError,
	},
	/// HMAC key was rejected by the MAC implementation.
	#[error("HMAC key was rejected.")]
	InvalidMacKey,
	/// A value cannot be carried in an HTTP header.
	#[error("The {name} value cannot be used as an HTTP header.")]
	InvalidHeaderValue {
		/// Logical name of the offending value.
		name: &'static str,
	},
	/// Token lifetime must be positive.
	#[error("Token lifetime must be positive.")]
	NonPositiveTokenTtl,
	/// The feed cannot be read through the requested adapter.
	#[error("The {feed} feed is not a flat entry feed.")]
	UnsupportedFeed {
		/// Feed label.
		feed: &'static str,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	EncodeBody {
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Feed decoding failures.
#[derive(Debug, ThisError)]
pub enum DecodingError {
	/// Response body is not valid JSON or does not match the expected envelope.
	#[error("The {feed} feed returned malformed JSON.")]
	Json {
		/// Feed label.
		feed: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The response document lacks the feed's envelope key.
	#[error("The {feed} feed response has no `{key}` array.")]
	MissingEnvelope {
		/// Feed label.
		feed: &'static str,
		/// Expected envelope key.
		key: &'static str,
	},
	/// A feed item does not match the expected item shape.
	#[error("The {feed} feed item #{index} is malformed.")]
	Item {
		/// Feed label.
		feed: &'static str,
		/// Zero-based position within the page.
		index: usize,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A feed item carried both an amendment and a cancellation reason.
	#[error("Feed item #{index} matches more than one event class.")]
	AmbiguousItem {
		/// Zero-based position within the page.
		index: usize,
	},
	/// A feed item is missing a field required by its event class.
	#[error("Feed item #{index} is missing the `{field}` field.")]
	MissingField {
		/// Zero-based position within the page.
		index: usize,
		/// Wire name of the missing field.
		field: &'static str,
	},
	/// A non-feed response body could not be parsed.
	#[error("Response body is not valid JSON.")]
	Body(#[source] serde_path_to_error::Error<serde_json::Error>),
}
