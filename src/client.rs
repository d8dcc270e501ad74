//! Authenticated request executor shared by every resource adapter.

// crates.io
use http::{
	HeaderMap, HeaderValue, Method, Request, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	auth::Secret,
	config::{self, ClientConfig},
	error::{ConfigError, DecodingError},
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::{SessionManager, SessionMetrics},
	transport::{self, ApiResponse, ApiTransport},
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestHttpClient;

/// Outbound request body.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
	/// No body.
	#[default]
	Empty,
	/// `application/x-www-form-urlencoded` pairs.
	Form(Vec<(String, String)>),
	/// JSON document; switches the default `Content-Type` to `application/json`.
	Json(Value),
}
impl RequestBody {
	/// Builds a form body from key/value pairs.
	pub fn form<I, K, V>(pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self::Form(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}

	fn into_bytes(self) -> Result<(Vec<u8>, Option<&'static str>)> {
		match self {
			Self::Empty => Ok((Vec::new(), None)),
			Self::Form(pairs) => {
				let mut form = FormSerializer::new(String::new());

				form.extend_pairs(pairs);

				Ok((form.finish().into_bytes(), None))
			},
			Self::Json(value) => {
				let bytes =
					serde_json::to_vec(&value).map_err(|source| ConfigError::EncodeBody { source })?;

				Ok((bytes, Some("application/json")))
			},
		}
	}
}

/// Structured body of a 400 response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorEnvelope {
	/// Machine-readable error code.
	pub code: String,
	/// Human-readable message.
	pub message: String,
}

/// Issues authenticated calls against one API endpoint.
///
/// The client owns the transport, the validated config, and the [`SessionManager`] whose
/// bearer token is injected into every request. Cloning is cheap and every clone shares the
/// same session, so a single login serves all tasks using the client.
pub struct Client<C>
where
	C: ?Sized + ApiTransport,
{
	/// Validated configuration.
	pub config: Arc<ClientConfig>,
	/// Transport used for every outbound request.
	pub transport: Arc<C>,
	session: Arc<SessionManager<C>>,
}
impl<C> Client<C>
where
	C: ?Sized + ApiTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(config: impl Into<Arc<ClientConfig>>, transport: impl Into<Arc<C>>) -> Self {
		let config = config.into();
		let transport = transport.into();
		let session = Arc::new(SessionManager::new(config.clone(), transport.clone()));

		Self { config, transport, session }
	}

	/// Session manager backing this client.
	pub fn session(&self) -> &SessionManager<C> {
		&self.session
	}

	/// Shared counters for login attempts and cache hits.
	pub fn session_metrics(&self) -> Arc<SessionMetrics> {
		self.session.metrics()
	}

	/// Returns a usable bearer token; see [`SessionManager::ensure_token`].
	pub async fn ensure_token(&self, force: bool) -> Result<Secret> {
		self.session.ensure_token(force).await
	}

	/// Liveness probe: `true` when a token can be obtained.
	pub async fn ping(&self) -> bool {
		self.session.ping().await
	}

	/// Invalidates the session server-side; the client must not be reused afterwards.
	pub async fn logout(&self) -> Result<()> {
		self.session.logout().await
	}

	/// Sends an authenticated request and returns the raw response.
	///
	/// Default headers (`Accept`, `Content-Type`, `User-Agent`, `Accept-Language`, and
	/// `Authorization`) are applied first; entries in `headers` replace them on conflict.
	pub async fn execute(
		&self,
		method: Method,
		path: &str,
		body: RequestBody,
		headers: HeaderMap,
	) -> Result<ApiResponse> {
		const KIND: OpKind = OpKind::Request;

		let span = OpSpan::new(KIND, "execute");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result: Result<ApiResponse> = span
			.instrument(async {
				let token = self.session.ensure_token(false).await?;
				let url = self.config.url_for(path)?;
				let (bytes, content_type) = body.into_bytes()?;
				let mut merged = self.config.default_headers()?;

				if let Some(content_type) = content_type {
					merged.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
				}

				merged.insert(AUTHORIZATION, config::header_value("token", token.expose())?);

				override_headers(&mut merged, &headers);

				let mut request = Request::builder()
					.method(method)
					.uri(url.as_str())
					.body(bytes)
					.map_err(ConfigError::from)?;

				*request.headers_mut() = merged;

				Ok(self.transport.send(request).await?)
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	/// Sends an authenticated request and returns the checked body.
	pub async fn request(
		&self,
		method: Method,
		path: &str,
		body: RequestBody,
		headers: HeaderMap,
	) -> Result<Vec<u8>> {
		let response = self.execute(method, path, body, headers).await?;

		check_response(&response)?;

		Ok(response.into_body())
	}

	/// Sends an authenticated request and decodes the checked body as JSON.
	pub async fn request_json<T>(
		&self,
		method: Method,
		path: &str,
		body: RequestBody,
		headers: HeaderMap,
	) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		let bytes = self.request(method, path, body, headers).await?;

		decode_body(&bytes)
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestHttpClient> {
	/// Creates a client backed by its own reqwest transport.
	pub fn new(config: ClientConfig) -> Result<Self> {
		Ok(Self::with_transport(config, ReqwestHttpClient::try_default()?))
	}
}
impl<C> Clone for Client<C>
where
	C: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			transport: self.transport.clone(),
			session: self.session.clone(),
		}
	}
}
impl<C> Debug for Client<C>
where
	C: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("endpoint", &self.config.endpoint.as_str())
			.field("session", &self.session)
			.finish()
	}
}

/// Classifies a response by status.
///
/// - `400` carries a JSON [`ErrorEnvelope`] and becomes [`Error::Domain`]; a body that does not
///   parse yields the code [`Error::UNKNOWN_CODE`] with a generic message.
/// - Any status above `400` becomes [`Error::Protocol`] with the reason phrase.
/// - `2xx` and `3xx` pass through.
/// - Informational statuses are never a final answer and read as a weird response.
pub fn check_response(response: &ApiResponse) -> Result<()> {
	let status = response.status();

	if status == StatusCode::BAD_REQUEST {
		let envelope = serde_json::from_slice::<ErrorEnvelope>(response.body()).unwrap_or_else(|_| {
			ErrorEnvelope { code: Error::UNKNOWN_CODE.into(), message: "General error".into() }
		});

		return Err(Error::Domain { code: envelope.code, message: envelope.message });
	}
	if status.as_u16() > 400 {
		return Err(Error::protocol(transport::reason_phrase(status)));
	}
	if status.is_informational() {
		return Err(Error::protocol("weird response"));
	}

	Ok(())
}

/// Replaces every header named in `overrides`, keeping all of its values.
fn override_headers(merged: &mut HeaderMap, overrides: &HeaderMap) {
	for name in overrides.keys() {
		merged.remove(name);
	}
	for (name, value) in overrides {
		merged.append(name.clone(), value.clone());
	}
}

/// Decodes a checked response body, reporting the JSON path of the first failure.
pub fn decode_body<T>(bytes: &[u8]) -> Result<T>
where
	T: for<'de> Deserialize<'de>,
{
	let mut de = serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(&mut de).map_err(|e| DecodingError::Body(e).into())
}
