//! Resource feed adapters built on the drain engine.
//!
//! Every feed is a `GET` against a fixed path whose JSON body wraps the page items in a
//! feed-specific envelope key, except the payment link feed, which returns a bare array. The mandate feed classifies each item into a [`MandateEvent`];
//! the other feeds hand every item to the caller as an opaque [`FeedEntry`].

pub mod entry;
pub mod mandate;

pub use entry::*;
pub use mandate::*;

// crates.io
use http::{HeaderMap, HeaderName, Method};
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	client::{self, Client, RequestBody},
	config,
	error::DecodingError,
	feed::{DrainSignal, FeedPage, PageFuture, PageSource},
	transport::ApiTransport,
};

/// Request header carrying the resume position.
pub const RESUME_AFTER_HEADER: HeaderName = HeaderName::from_static("x-resume-after");
/// Response header carrying the position of the page's last item.
pub const LAST_HEADER: HeaderName = HeaderName::from_static("x-last");

/// Change feeds exposed by the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedKind {
	/// Mandate lifecycle events.
	Mandate,
	/// Transaction status changes.
	Transaction,
	/// Invoice status changes.
	Invoice,
	/// Payment link status changes.
	PaymentLink,
	/// Credit transfer (refund) status changes.
	CreditTransfer,
}
impl FeedKind {
	/// Stable label used in spans, metrics, and errors.
	pub const fn label(self) -> &'static str {
		match self {
			Self::Mandate => "mandate",
			Self::Transaction => "transaction",
			Self::Invoice => "invoice",
			Self::PaymentLink => "payment_link",
			Self::CreditTransfer => "credit_transfer",
		}
	}

	/// Request path of the feed.
	pub const fn path(self) -> &'static str {
		match self {
			Self::Mandate => "/creditor/mandate",
			Self::Transaction => "/creditor/transaction",
			Self::Invoice => "/creditor/invoice",
			Self::PaymentLink => "/creditor/payment/link/feed",
			Self::CreditTransfer => "/creditor/transfer",
		}
	}

	/// JSON key wrapping the page items; `None` when the body is a bare array.
	pub const fn envelope(self) -> Option<&'static str> {
		match self {
			Self::Mandate => Some("Messages"),
			Self::Transaction | Self::CreditTransfer => Some("Entries"),
			Self::Invoice => Some("Invoices"),
			Self::PaymentLink => None,
		}
	}
}
impl Display for FeedKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.label())
	}
}

/// Per-drain options.
#[derive(Clone, Debug, Default)]
pub struct FeedOptions {
	/// Values sent as repeated `include` query parameters, e.g. `person` or `cancelled_mandate`.
	pub includes: Vec<String>,
	/// Stop flag checked between pages.
	pub signal: Option<DrainSignal>,
}
impl FeedOptions {
	/// Creates empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an `include` value.
	pub fn include(mut self, value: impl Into<String>) -> Self {
		self.includes.push(value.into());

		self
	}

	/// Attaches a stop signal.
	pub fn signal(mut self, signal: DrainSignal) -> Self {
		self.signal = Some(signal);

		self
	}

	fn path_for(&self, kind: FeedKind) -> String {
		if self.includes.is_empty() {
			return kind.path().to_owned();
		}

		let mut query = FormSerializer::new(String::new());

		for value in &self.includes {
			query.append_pair("include", value);
		}

		format!("{}?{}", kind.path(), query.finish())
	}
}

/// [`PageSource`] issuing authenticated feed requests through a [`Client`].
pub struct ClientPageSource<'a, C>
where
	C: ?Sized + ApiTransport,
{
	client: &'a Client<C>,
	kind: FeedKind,
	path: String,
}
impl<'a, C> ClientPageSource<'a, C>
where
	C: ?Sized + ApiTransport,
{
	/// Targets `kind` with the given options.
	pub fn new(client: &'a Client<C>, kind: FeedKind, options: &FeedOptions) -> Self {
		Self { client, kind, path: options.path_for(kind) }
	}
}
impl<C> PageSource for ClientPageSource<'_, C>
where
	C: ?Sized + ApiTransport,
{
	fn label(&self) -> &'static str {
		self.kind.label()
	}

	fn fetch<'a>(&'a self, position: Option<&'a str>) -> PageFuture<'a> {
		Box::pin(self.fetch_page(position))
	}
}
impl<C> ClientPageSource<'_, C>
where
	C: ?Sized + ApiTransport,
{
	async fn fetch_page(&self, position: Option<&str>) -> Result<FeedPage> {
		let mut headers = HeaderMap::new();

		if let Some(position) = position {
			headers.insert(RESUME_AFTER_HEADER, config::header_value("cursor", position)?);
		}

		let response =
			self.client.execute(Method::GET, &self.path, RequestBody::Empty, headers).await?;

		client::check_response(&response)?;

		let last = response
			.headers()
			.get(LAST_HEADER)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned);

		Ok(FeedPage { body: response.into_body(), last })
	}
}
impl<C> Debug for ClientPageSource<'_, C>
where
	C: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientPageSource").field("kind", &self.kind).field("path", &self.path).finish()
	}
}

/// Splits a feed body into its raw items.
pub(crate) fn envelope_items(kind: FeedKind, body: &[u8]) -> Result<Vec<Value>> {
	let feed = kind.label();
	let mut de = serde_json::Deserializer::from_slice(body);
	let Some(key) = kind.envelope() else {
		return serde_path_to_error::deserialize(&mut de)
			.map_err(|source| DecodingError::Json { feed, source }.into());
	};
	let mut document: BTreeMap<String, Value> = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| DecodingError::Json { feed, source })?;
	let items = document.remove(key).ok_or(DecodingError::MissingEnvelope { feed, key })?;

	serde_path_to_error::deserialize(items)
		.map_err(|source| DecodingError::Json { feed, source }.into())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn kinds_map_to_paths_and_envelopes() {
		assert_eq!(FeedKind::Mandate.envelope(), Some("Messages"));
		assert_eq!(FeedKind::Transaction.envelope(), Some("Entries"));
		assert_eq!(FeedKind::PaymentLink.envelope(), None);
		assert_eq!(FeedKind::CreditTransfer.path(), "/creditor/transfer");
		assert_eq!(FeedKind::PaymentLink.path(), "/creditor/payment/link/feed");
		assert_eq!(FeedKind::Invoice.to_string(), "invoice");
	}

	#[test]
	fn includes_become_repeated_query_parameters() {
		let options = FeedOptions::new().include("mandate").include("cancelled_mandate");

		assert_eq!(
			options.path_for(FeedKind::Mandate),
			"/creditor/mandate?include=mandate&include=cancelled_mandate"
		);
		assert_eq!(FeedOptions::new().path_for(FeedKind::Invoice), "/creditor/invoice");
	}

	#[test]
	fn envelope_items_require_the_feed_key() {
		let items = envelope_items(FeedKind::Invoice, b"{\"Invoices\":[{\"id\":\"a\"},{\"id\":\"b\"}]}")
			.expect("Envelope should decode.");

		assert_eq!(items.len(), 2);

		let err = envelope_items(FeedKind::Invoice, b"{\"Entries\":[]}")
			.expect_err("Wrong envelope should fail.");

		assert!(matches!(
			err,
			Error::Decoding(DecodingError::MissingEnvelope { feed: "invoice", key: "Invoices" })
		));

		let err = envelope_items(FeedKind::Invoice, b"{\"Invoices\":{}}")
			.expect_err("Non-array envelope should fail.");

		assert!(matches!(err, Error::Decoding(DecodingError::Json { feed: "invoice", .. })));
	}

	#[test]
	fn payment_link_pages_are_bare_arrays() {
		let items =
			envelope_items(FeedKind::PaymentLink, b"[{\"id\":1,\"state\":\"paid\"},{\"id\":2}]")
				.expect("Bare array should decode.");

		assert_eq!(items.len(), 2);
		assert_eq!(items[0]["state"], "paid");
		assert!(
			envelope_items(FeedKind::PaymentLink, b"[]")
				.expect("Empty bare array should decode.")
				.is_empty()
		);

		let err = envelope_items(FeedKind::PaymentLink, b"{\"Links\":[]}")
			.expect_err("Wrapped payment link pages should fail.");

		assert!(matches!(err, Error::Decoding(DecodingError::Json { feed: "payment_link", .. })));
	}
}
