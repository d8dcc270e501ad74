//! Bearer session orchestration with single-flight logins.
//!
//! [`SessionManager::ensure_token`] hands out the cached bearer token while it is younger than
//! the configured lifetime and otherwise performs the login exchange. Every login runs under
//! one async guard, so concurrent callers that find a stale cache wait for the in-flight login
//! and reuse its token instead of sending their own. The cached session is written only after
//! a login completes; dropping a pending `ensure_token` future leaves the previous state intact.

mod metrics;

pub use metrics::SessionMetrics;

// crates.io
use http::{
	Method, Request, StatusCode,
	header::{AUTHORIZATION, HeaderName},
};
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	auth::{Secret, Session},
	config::{self, ClientConfig},
	error::ConfigError,
	obs::{self, OpKind, OpOutcome, OpSpan},
	otp,
	transport::{self, ApiResponse, ApiTransport},
};

/// Response header carrying application-level login failures.
pub const API_ERROR_HEADER: HeaderName = HeaderName::from_static("apierror");
/// Path of the login and logout endpoint.
pub const LOGIN_PATH: &str = "/creditor";

#[derive(Clone, Debug, Default)]
enum SessionState {
	#[default]
	Empty,
	Active(Session),
	LoggedOut,
}

/// Owns the bearer session shared by every request issued through one client.
pub struct SessionManager<C>
where
	C: ?Sized + ApiTransport,
{
	transport: Arc<C>,
	config: Arc<ClientConfig>,
	state: RwLock<SessionState>,
	login_guard: AsyncMutex<()>,
	metrics: Arc<SessionMetrics>,
}
impl<C> SessionManager<C>
where
	C: ?Sized + ApiTransport,
{
	/// Creates a manager with an empty session.
	pub fn new(config: impl Into<Arc<ClientConfig>>, transport: impl Into<Arc<C>>) -> Self {
		Self {
			transport: transport.into(),
			config: config.into(),
			state: RwLock::new(SessionState::Empty),
			login_guard: AsyncMutex::new(()),
			metrics: Default::default(),
		}
	}

	/// Shared counters for login attempts and cache hits.
	pub fn metrics(&self) -> Arc<SessionMetrics> {
		self.metrics.clone()
	}

	/// Returns a snapshot of the cached session, if any.
	pub fn current(&self) -> Option<Session> {
		match &*self.state.read() {
			SessionState::Active(session) => Some(session.clone()),
			_ => None,
		}
	}

	/// Returns `true` once [`logout`](Self::logout) has been called.
	pub fn is_logged_out(&self) -> bool {
		matches!(*self.state.read(), SessionState::LoggedOut)
	}

	/// Returns a usable bearer token, logging in when the cache is stale or `force` is set.
	pub async fn ensure_token(&self, force: bool) -> Result<Secret> {
		if let Some(TokenLookup::Fresh(token)) = self.fresh_token(force, OffsetDateTime::now_utc())? {
			self.metrics.record_cache_hit();

			return Ok(token);
		}

		let waited_from = OffsetDateTime::now_utc();
		let _singleflight = self.login_guard.lock().await;

		// Another caller may have logged in while this one waited for the guard.
		match self.fresh_token(force, OffsetDateTime::now_utc())? {
			Some(TokenLookup::Fresh(token)) => {
				self.metrics.record_cache_hit();

				return Ok(token);
			},
			Some(TokenLookup::Forced(session)) if session.obtained_at > waited_from => {
				self.metrics.record_cache_hit();

				return Ok(session.token);
			},
			_ => {},
		}

		let session = self.login().await?;

		Ok(session.token)
	}

	/// Checks that a token can be obtained; any failure reads as `false`.
	pub async fn ping(&self) -> bool {
		self.ensure_token(false).await.is_ok()
	}

	/// Invalidates the token server-side. The manager refuses to log in afterwards.
	pub async fn logout(&self) -> Result<()> {
		const KIND: OpKind = OpKind::Logout;

		let span = OpSpan::new(KIND, "logout");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result: Result<()> = span
			.instrument(async {
				let _singleflight = self.login_guard.lock().await;
				let previous = std::mem::replace(&mut *self.state.write(), SessionState::LoggedOut);
				let SessionState::Active(session) = previous else {
					return Ok(());
				};
				let mut headers = self.config.default_headers()?;

				headers.remove(http::header::CONTENT_TYPE);
				headers.remove(http::header::ACCEPT);
				headers.insert(AUTHORIZATION, config::header_value("token", session.token.expose())?);

				let mut request = Request::builder()
					.method(Method::GET)
					.uri(self.config.url_for(LOGIN_PATH)?.as_str())
					.body(Vec::new())
					.map_err(ConfigError::from)?;

				*request.headers_mut() = headers;

				let response = self.transport.send(request).await?;

				if response.status().as_u16() >= 400 {
					return Err(Error::protocol(transport::reason_phrase(response.status())));
				}

				Ok(())
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	fn fresh_token(&self, force: bool, now: OffsetDateTime) -> Result<Option<TokenLookup>> {
		match &*self.state.read() {
			SessionState::LoggedOut =>
				Err(Error::authentication("the session was logged out and cannot be reused")),
			SessionState::Empty => Ok(None),
			SessionState::Active(session) if force => Ok(Some(TokenLookup::Forced(session.clone()))),
			SessionState::Active(session) if session.is_fresh_at(now) =>
				Ok(Some(TokenLookup::Fresh(session.token.clone()))),
			SessionState::Active(_) => Ok(Some(TokenLookup::Stale)),
		}
	}

	async fn login(&self) -> Result<Session> {
		const KIND: OpKind = OpKind::Login;

		let span = OpSpan::new(KIND, "ensure_token");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.metrics.record_login();

		let result: Result<Session> = span
			.instrument(async {
				let request = self.login_request(OffsetDateTime::now_utc())?;
				let response = self.transport.send(request).await?;
				let token = classify_login(&response)?;

				Ok(Session::new(token, OffsetDateTime::now_utc(), self.config.token_ttl))
			})
			.await;

		match &result {
			Ok(session) => {
				*self.state.write() = SessionState::Active(session.clone());

				self.metrics.record_success();
			},
			Err(_) => {
				*self.state.write() = SessionState::Empty;

				self.metrics.record_failure();
			},
		}

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	fn login_request(&self, now: OffsetDateTime) -> Result<Request<Vec<u8>>> {
		let mut form = FormSerializer::new(String::new());

		form.append_pair("apiToken", self.config.api_key.expose());

		if let Some(key) = self.config.private_key.as_ref() {
			form.append_pair("otp", &otp::compute_otp(key.expose(), otp::epoch_seconds(now))?);
		}

		let mut request = Request::builder()
			.method(Method::POST)
			.uri(self.config.url_for(LOGIN_PATH)?.as_str())
			.body(form.finish().into_bytes())
			.map_err(ConfigError::from)?;

		*request.headers_mut() = self.config.default_headers()?;

		Ok(request)
	}
}
impl<C> Debug for SessionManager<C>
where
	C: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionManager")
			.field("endpoint", &self.config.endpoint.as_str())
			.field("state", &*self.state.read())
			.finish()
	}
}

enum TokenLookup {
	Fresh(Secret),
	Forced(Session),
	Stale,
}

/// Reads the token out of a login response.
///
/// Exactly one `Authorization` header means success, exactly one `Apierror` header is an
/// application-level rejection, and any other shape is a protocol failure.
pub(crate) fn classify_login(response: &ApiResponse) -> Result<String> {
	let headers = response.headers();
	let tokens = headers.get_all(AUTHORIZATION).iter().collect::<Vec<_>>();

	if let [token] = tokens.as_slice() {
		return token
			.to_str()
			.map(str::to_owned)
			.map_err(|_| Error::protocol("login returned a non-ASCII token"));
	}

	let api_errors = headers.get_all(API_ERROR_HEADER).iter().collect::<Vec<_>>();

	if let [message] = api_errors.as_slice() {
		return Err(Error::authentication(String::from_utf8_lossy(message.as_bytes())));
	}

	let status = response.status();

	if status == StatusCode::OK {
		Err(Error::protocol("login response did not carry a token"))
	} else {
		Err(Error::protocol(transport::reason_phrase(status)))
	}
}
