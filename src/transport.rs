//! Transport primitives for API calls.
//!
//! [`ApiTransport`] is the client's only dependency on an HTTP stack. Requests and responses
//! are plain [`http`] values with buffered bodies so custom transports (and test doubles) only
//! need to move bytes; status interpretation lives in the client.

// std
use std::ops::Deref;
// self
use crate::{_prelude::*, error::TransportError};

/// Request handed to a transport.
pub type ApiRequest = http::Request<Vec<u8>>;
/// Buffered response returned by a transport.
pub type ApiResponse = http::Response<Vec<u8>>;
/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing API calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back a [`Client`]
/// shared across tasks. A transport reports only network-level failures; every HTTP status,
/// including 4xx and 5xx, is a successful [`ApiResponse`].
///
/// [`Client`]: crate::client::Client
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends a request and buffers the full response body.
	fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Login and feed endpoints answer directly; configure any custom [`ReqwestClient`] to disable
/// redirect following so an `Authorization` header is never replayed to another host.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds the default client (no redirects).
	pub fn try_default() -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestHttpClient {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(execute_buffered(self.0.clone(), request))
	}
}

#[cfg(feature = "reqwest")]
async fn execute_buffered(
	client: ReqwestClient,
	request: ApiRequest,
) -> Result<ApiResponse, TransportError> {
	let request = reqwest::Request::try_from(request)?;
	let response = client.execute(request).await?;
	let status = response.status();
	let version = response.version();
	let headers = response.headers().to_owned();
	let body = response.bytes().await?.to_vec();
	let mut buffered = ApiResponse::new(body);

	*buffered.status_mut() = status;
	*buffered.version_mut() = version;
	*buffered.headers_mut() = headers;

	Ok(buffered)
}

impl<T> ApiTransport for Arc<T>
where
	T: ?Sized + ApiTransport,
{
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		self.as_ref().send(request)
	}
}

/// Reason phrase reported for a status, falling back to the numeric code.
pub(crate) fn reason_phrase(status: http::StatusCode) -> String {
	status.canonical_reason().map(str::to_owned).unwrap_or_else(|| status.as_str().to_owned())
}
