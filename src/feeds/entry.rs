//! Flat feeds whose items are delivered as opaque JSON entries.

// self
use crate::{
	_prelude::*,
	client::Client,
	error::ConfigError,
	feed::{self, DrainSummary, FeedCursor, FeedDecoder, FeedDispatcher, FeedPages, HandlerResult},
	feeds::{self, ClientPageSource, FeedKind, FeedOptions},
	transport::ApiTransport,
};

/// One item of a flat feed.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedEntry {
	/// Feed the item came from.
	pub kind: FeedKind,
	/// Raw item as returned by the API.
	pub payload: Value,
}
impl FeedEntry {
	/// Returns a top-level field of the payload.
	pub fn field(&self, key: &str) -> Option<&Value> {
		self.payload.get(key)
	}

	/// Returns a top-level string field of the payload.
	pub fn str_field(&self, key: &str) -> Option<&str> {
		self.field(key).and_then(Value::as_str)
	}
}

/// Receives the items of a flat feed.
///
/// Closures of the form `FnMut(FeedEntry) -> HandlerResult` implement this trait.
pub trait EntryFeedHandler {
	/// Called once per page with the reported position and the number of items.
	fn start(&mut self, position: Option<&str>, count: usize) -> HandlerResult {
		let _ = (position, count);

		Ok(())
	}

	/// Handles one item.
	fn handle(&mut self, entry: FeedEntry) -> HandlerResult;
}
impl<F> EntryFeedHandler for F
where
	F: FnMut(FeedEntry) -> HandlerResult,
{
	fn handle(&mut self, entry: FeedEntry) -> HandlerResult {
		self(entry)
	}
}

/// Decodes flat feed pages into [`FeedEntry`] values.
#[derive(Clone, Copy, Debug)]
pub struct EntryDecoder(pub FeedKind);
impl FeedDecoder for EntryDecoder {
	type Event = FeedEntry;

	fn decode(&self, body: &[u8]) -> Result<Vec<FeedEntry>> {
		let kind = self.0;

		Ok(feeds::envelope_items(kind, body)?
			.into_iter()
			.map(|payload| FeedEntry { kind, payload })
			.collect())
	}
}

struct EntryDispatch<'h, H>(&'h mut H)
where
	H: ?Sized;
impl<H> FeedDispatcher<FeedEntry> for EntryDispatch<'_, H>
where
	H: ?Sized + EntryFeedHandler,
{
	fn start(&mut self, position: Option<&str>, count: usize) -> HandlerResult {
		self.0.start(position, count)
	}

	fn dispatch(&mut self, event: FeedEntry) -> HandlerResult {
		self.0.handle(event)
	}
}

impl<C> Client<C>
where
	C: ?Sized + ApiTransport,
{
	/// Drains a flat feed into `handler`.
	///
	/// `kind` must not be [`FeedKind::Mandate`]; mandate items are classified by
	/// [`mandate_feed`](Self::mandate_feed) instead.
	pub async fn entry_feed<H>(
		&self,
		kind: FeedKind,
		cursor: &mut FeedCursor,
		handler: &mut H,
		options: &FeedOptions,
	) -> Result<DrainSummary>
	where
		H: ?Sized + EntryFeedHandler,
	{
		if kind == FeedKind::Mandate {
			return Err(ConfigError::UnsupportedFeed { feed: kind.label() }.into());
		}

		let source = ClientPageSource::new(self, kind, options);

		feed::drain(
			cursor,
			&source,
			EntryDecoder(kind),
			&mut EntryDispatch(handler),
			options.signal.as_ref(),
		)
		.await
	}

	/// Drains the transaction feed (`Entries`).
	pub async fn transaction_feed<H>(
		&self,
		cursor: &mut FeedCursor,
		handler: &mut H,
		options: &FeedOptions,
	) -> Result<DrainSummary>
	where
		H: ?Sized + EntryFeedHandler,
	{
		self.entry_feed(FeedKind::Transaction, cursor, handler, options).await
	}

	/// Drains the invoice feed (`Invoices`).
	pub async fn invoice_feed<H>(
		&self,
		cursor: &mut FeedCursor,
		handler: &mut H,
		options: &FeedOptions,
	) -> Result<DrainSummary>
	where
		H: ?Sized + EntryFeedHandler,
	{
		self.entry_feed(FeedKind::Invoice, cursor, handler, options).await
	}

	/// Drains the payment link feed, whose pages are bare JSON arrays.
	pub async fn payment_link_feed<H>(
		&self,
		cursor: &mut FeedCursor,
		handler: &mut H,
		options: &FeedOptions,
	) -> Result<DrainSummary>
	where
		H: ?Sized + EntryFeedHandler,
	{
		self.entry_feed(FeedKind::PaymentLink, cursor, handler, options).await
	}

	/// Drains the credit transfer feed (`Entries`).
	pub async fn credit_transfer_feed<H>(
		&self,
		cursor: &mut FeedCursor,
		handler: &mut H,
		options: &FeedOptions,
	) -> Result<DrainSummary>
	where
		H: ?Sized + EntryFeedHandler,
	{
		self.entry_feed(FeedKind::CreditTransfer, cursor, handler, options).await
	}

	/// Reads a flat feed as a lazy sequence of batches.
	pub fn entry_pages<'a>(
		&'a self,
		kind: FeedKind,
		cursor: &'a mut FeedCursor,
		options: &FeedOptions,
	) -> FeedPages<'a, ClientPageSource<'a, C>, EntryDecoder> {
		FeedPages::new(ClientPageSource::new(self, kind, options), EntryDecoder(kind), cursor)
	}
}
