//! Drain-to-empty engine shared by every change feed.
//!
//! A feed is read page by page: each request carries the caller's [`FeedCursor`] as the resume
//! position, the response reports the position of its last item, and the loop stops only when
//! a page decodes to zero events. [`drain`] runs that loop to completion and pushes every event
//! into a [`FeedDispatcher`]; [`FeedPages`] exposes the same loop as a pull-based sequence.
//!
//! Delivery is at-least-once. The cursor moves past a page only after the page was handed out
//! and (for [`drain`]) fully dispatched, so a failure replays the interrupted page on the next
//! run.

mod cursor;
mod signal;

pub use cursor::FeedCursor;
pub use signal::DrainSignal;

// self
use crate::{
	_prelude::*,
	error::BoxError,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Result returned by caller-supplied feed handlers.
pub type HandlerResult = std::result::Result<(), BoxError>;
/// Boxed future returned by [`PageSource::fetch`].
pub type PageFuture<'a> = Pin<Box<dyn Future<Output = Result<FeedPage>> + 'a + Send>>;

/// Raw page returned by a [`PageSource`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedPage {
	/// Checked response body.
	pub body: Vec<u8>,
	/// Position reported by the server for this page, if any.
	pub last: Option<String>,
}

/// Fetches raw feed pages.
pub trait PageSource
where
	Self: Send + Sync,
{
	/// Stable feed label used in spans, metrics, and decoding errors.
	fn label(&self) -> &'static str;

	/// Fetches the page following `position` (or the default start when `None`).
	fn fetch<'a>(&'a self, position: Option<&'a str>) -> PageFuture<'a>;
}
impl<S> PageSource for &S
where
	S: ?Sized + PageSource,
{
	fn label(&self) -> &'static str {
		(**self).label()
	}

	fn fetch<'a>(&'a self, position: Option<&'a str>) -> PageFuture<'a> {
		(**self).fetch(position)
	}
}

/// Turns a page body into ordered events.
pub trait FeedDecoder {
	/// Event type produced for each item.
	type Event;

	/// Decodes every item of the page, preserving array order.
	fn decode(&self, body: &[u8]) -> Result<Vec<Self::Event>>;
}

/// Receives the events of a drain.
pub trait FeedDispatcher<E> {
	/// Called once per fetched page, including the final empty one, before its events.
	fn start(&mut self, position: Option<&str>, count: usize) -> HandlerResult {
		let _ = (position, count);

		Ok(())
	}

	/// Handles one event; an error aborts the drain.
	fn dispatch(&mut self, event: E) -> HandlerResult;
}

/// Events decoded from one page.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedBatch<E> {
	/// Events in server order.
	pub events: Vec<E>,
	/// Position reported for the page.
	pub position: Option<String>,
}
impl<E> FeedBatch<E> {
	/// Number of events in the batch.
	pub fn len(&self) -> usize {
		self.events.len()
	}

	/// Returns `true` for the terminating page.
	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}
}

/// Totals reported by [`drain`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainSummary {
	/// Events dispatched.
	pub events: usize,
	/// Pages fetched, including the terminating empty page.
	pub pages: usize,
	/// `true` when a [`DrainSignal`] stopped the drain before the empty page.
	pub interrupted: bool,
}

/// Lazy sequence of feed batches.
///
/// [`next_batch`](Self::next_batch) yields one non-empty batch per call and `None` forever once
/// the empty page was seen. The cursor advances past a yielded batch on the following call or
/// on an explicit [`commit`](Self::commit); dropping the sequence without either leaves the
/// batch to be replayed.
pub struct FeedPages<'a, S, D> {
	source: S,
	decoder: D,
	cursor: &'a mut FeedCursor,
	pending: Option<String>,
	exhausted: bool,
}
impl<'a, S, D> FeedPages<'a, S, D>
where
	S: PageSource,
	D: FeedDecoder,
{
	/// Starts a sequence resuming from `cursor`.
	pub fn new(source: S, decoder: D, cursor: &'a mut FeedCursor) -> Self {
		Self { source, decoder, cursor, pending: None, exhausted: false }
	}

	/// Current resume point.
	pub fn cursor(&self) -> &FeedCursor {
		self.cursor
	}

	/// Returns `true` after the empty page was fetched.
	pub fn is_exhausted(&self) -> bool {
		self.exhausted
	}

	/// Marks the last yielded batch as handled and advances the cursor past it.
	pub fn commit(&mut self) {
		self.cursor.advance(self.pending.take());
	}

	/// Fetches the next non-empty batch.
	pub async fn next_batch(&mut self) -> Result<Option<FeedBatch<D::Event>>> {
		Ok(self.next_page().await?.filter(|batch| !batch.is_empty()))
	}

	async fn next_page(&mut self) -> Result<Option<FeedBatch<D::Event>>> {
		if self.exhausted {
			return Ok(None);
		}

		self.commit();

		let page = self.source.fetch(self.cursor.position()).await?;
		let events = self.decoder.decode(&page.body)?;

		#[cfg(feature = "tracing")]
		tracing::debug!(feed = self.source.label(), events = events.len(), "Feed page fetched.");

		if events.is_empty() {
			self.exhausted = true;
			self.cursor.advance(page.last.clone());
		} else {
			self.pending = page.last.clone();
		}

		Ok(Some(FeedBatch { events, position: page.last }))
	}
}
impl<S, D> Debug for FeedPages<'_, S, D>
where
	S: PageSource,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FeedPages")
			.field("feed", &self.source.label())
			.field("cursor", &self.cursor)
			.field("pending", &self.pending)
			.field("exhausted", &self.exhausted)
			.finish()
	}
}

/// Drains a feed until it returns an empty page.
///
/// Each page is reported to [`FeedDispatcher::start`] and its events are dispatched in order.
/// Fetch, decode, and handler failures abort the drain; events dispatched before the failure
/// stay dispatched and the cursor stays on the last fully handled page. A raised `signal` stops
/// the loop before the next fetch.
pub async fn drain<S, D, H>(
	cursor: &mut FeedCursor,
	source: &S,
	decoder: D,
	dispatcher: &mut H,
	signal: Option<&DrainSignal>,
) -> Result<DrainSummary>
where
	S: ?Sized + PageSource,
	D: FeedDecoder,
	H: ?Sized + FeedDispatcher<D::Event>,
{
	const KIND: OpKind = OpKind::FeedDrain;

	let feed = source.label();
	let span = OpSpan::new(KIND, feed);

	obs::record_op_outcome(KIND, OpOutcome::Attempt);

	let result: Result<DrainSummary> = span
		.instrument(async {
			let mut pages = FeedPages::new(source, decoder, cursor);
			let mut summary = DrainSummary::default();

			loop {
				if signal.is_some_and(DrainSignal::is_raised) {
					summary.interrupted = true;

					break;
				}

				let Some(batch) = pages.next_page().await? else {
					break;
				};

				summary.pages += 1;

				dispatcher.start(batch.position.as_deref(), batch.len()).map_err(Error::handler)?;

				if batch.is_empty() {
					break;
				}

				for event in batch.events {
					dispatcher.dispatch(event).map_err(Error::handler)?;

					summary.events += 1;
				}

				pages.commit();
			}

			Ok(summary)
		})
		.await;

	if let Ok(summary) = &result {
		obs::record_feed_events(feed, summary.events as u64);
	}

	obs::record_op_outcome(KIND, OpOutcome::of(&result));

	result
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::VecDeque;
	// self
	use super::*;
	use crate::client::decode_body;

	#[derive(Default)]
	struct ScriptedSource {
		pages: Mutex<VecDeque<Result<FeedPage>>>,
		requested: Mutex<Vec<Option<String>>>,
	}
	impl ScriptedSource {
		fn new(pages: Vec<Result<FeedPage>>) -> Self {
			Self { pages: Mutex::new(pages.into()), requested: Default::default() }
		}

		fn requested(&self) -> Vec<Option<String>> {
			self.requested.lock().clone()
		}
	}
	impl PageSource for ScriptedSource {
		fn label(&self) -> &'static str {
			"scripted"
		}

		fn fetch<'a>(&'a self, position: Option<&'a str>) -> PageFuture<'a> {
			self.requested.lock().push(position.map(str::to_owned));

			let next = self.pages.lock().pop_front();

			Box::pin(async move {
				next.unwrap_or_else(|| Err(Error::protocol("script exhausted")))
			})
		}
	}

	struct NumberDecoder;
	impl FeedDecoder for NumberDecoder {
		type Event = u32;

		fn decode(&self, body: &[u8]) -> Result<Vec<u32>> {
			decode_body(body)
		}
	}

	#[derive(Default)]
	struct Recorder {
		starts: Vec<(Option<String>, usize)>,
		events: Vec<u32>,
		fail_on: Option<u32>,
		raise_on: Option<(u32, DrainSignal)>,
	}
	impl FeedDispatcher<u32> for Recorder {
		fn start(&mut self, position: Option<&str>, count: usize) -> HandlerResult {
			self.starts.push((position.map(str::to_owned), count));

			Ok(())
		}

		fn dispatch(&mut self, event: u32) -> HandlerResult {
			if self.fail_on == Some(event) {
				return Err(format!("handler rejected {event}").into());
			}
			if let Some((at, signal)) = &self.raise_on
				&& *at == event
			{
				signal.raise();
			}

			self.events.push(event);

			Ok(())
		}
	}

	fn page(items: &[u32], last: Option<&str>) -> Result<FeedPage> {
		let body = serde_json::to_vec(items).expect("Test items should serialize.");

		Ok(FeedPage { body, last: last.map(str::to_owned) })
	}

	#[tokio::test]
	async fn drains_until_the_empty_page() {
		let source = ScriptedSource::new(vec![
			page(&[1, 2, 3], Some("p1")),
			page(&[4, 5], Some("p2")),
			page(&[], Some("p2")),
		]);
		let mut cursor = FeedCursor::new();
		let mut recorder = Recorder::default();
		let summary = drain(&mut cursor, &source, NumberDecoder, &mut recorder, None)
			.await
			.expect("Drain should succeed.");

		assert_eq!(summary, DrainSummary { events: 5, pages: 3, interrupted: false });
		assert_eq!(recorder.events, vec![1, 2, 3, 4, 5]);
		assert_eq!(
			recorder.starts,
			vec![(Some("p1".into()), 3), (Some("p2".into()), 2), (Some("p2".into()), 0)]
		);
		assert_eq!(source.requested(), vec![None, Some("p1".into()), Some("p2".into())]);
		assert_eq!(cursor.position(), Some("p2"));
	}

	#[tokio::test]
	async fn large_pages_never_end_the_drain() {
		let large = (0..500).collect::<Vec<u32>>();
		let source = ScriptedSource::new(vec![
			page(&large, Some("p1")),
			page(&[500], Some("p2")),
			page(&[], None),
		]);
		let mut cursor = FeedCursor::new();
		let mut recorder = Recorder::default();
		let summary = drain(&mut cursor, &source, NumberDecoder, &mut recorder, None)
			.await
			.expect("Drain should succeed.");

		assert_eq!(summary.events, 501);
		assert_eq!(summary.pages, 3);
		assert_eq!(recorder.events.last(), Some(&500));
	}

	#[tokio::test]
	async fn handler_failure_keeps_the_cursor_on_the_last_handled_page() {
		let source =
			ScriptedSource::new(vec![page(&[1, 2], Some("p1")), page(&[3, 4], Some("p2"))]);
		let mut cursor = FeedCursor::new();
		let mut recorder = Recorder { fail_on: Some(3), ..Default::default() };
		let err = drain(&mut cursor, &source, NumberDecoder, &mut recorder, None)
			.await
			.expect_err("Handler failure should abort the drain.");

		assert!(matches!(err, Error::Handler { .. }));
		assert_eq!(recorder.events, vec![1, 2]);
		assert_eq!(cursor.position(), Some("p1"));
		assert_eq!(source.requested().len(), 2);
	}

	#[tokio::test]
	async fn fetch_and_decode_failures_abort() {
		let source = ScriptedSource::new(vec![
			page(&[1], Some("p1")),
			Err(Error::Protocol { reason: "Bad Gateway".into() }),
		]);
		let mut cursor = FeedCursor::new();
		let mut recorder = Recorder::default();
		let err = drain(&mut cursor, &source, NumberDecoder, &mut recorder, None)
			.await
			.expect_err("Fetch failure should abort the drain.");

		assert!(matches!(err, Error::Protocol { reason } if reason == "Bad Gateway"));
		assert_eq!(cursor.position(), Some("p1"));

		let source = ScriptedSource::new(vec![Ok(FeedPage { body: b"{".to_vec(), last: None })]);
		let err = drain(&mut cursor, &source, NumberDecoder, &mut Recorder::default(), None)
			.await
			.expect_err("Malformed page should abort the drain.");

		assert!(matches!(err, Error::Decoding(_)));
	}

	#[tokio::test]
	async fn missing_last_header_keeps_the_cursor() {
		let source = ScriptedSource::new(vec![page(&[7], None), page(&[], None)]);
		let mut cursor = FeedCursor::resume_after("c0");
		let mut recorder = Recorder::default();

		drain(&mut cursor, &source, NumberDecoder, &mut recorder, None)
			.await
			.expect("Drain should succeed.");

		assert_eq!(cursor.position(), Some("c0"));
		assert_eq!(source.requested(), vec![Some("c0".into()), Some("c0".into())]);
	}

	#[tokio::test]
	async fn raised_signal_stops_between_pages() {
		let signal = DrainSignal::new();
		let source = ScriptedSource::new(vec![
			page(&[1, 2], Some("p1")),
			page(&[3], Some("p2")),
			page(&[], None),
		]);
		let mut cursor = FeedCursor::new();
		let mut recorder = Recorder { raise_on: Some((1, signal.clone())), ..Default::default() };
		let summary = drain(&mut cursor, &source, NumberDecoder, &mut recorder, Some(&signal))
			.await
			.expect("Interrupted drain should still succeed.");

		assert_eq!(summary, DrainSummary { events: 2, pages: 1, interrupted: true });
		assert_eq!(cursor.position(), Some("p1"));
		assert_eq!(source.requested().len(), 1);
	}

	#[tokio::test]
	async fn pages_yield_batches_then_none_forever() {
		let source = ScriptedSource::new(vec![
			page(&[1, 2], Some("p1")),
			page(&[3], Some("p2")),
			page(&[], Some("p3")),
		]);
		let mut cursor = FeedCursor::new();
		let mut pages = FeedPages::new(&source, NumberDecoder, &mut cursor);
		let first = pages.next_batch().await.expect("First page should load.");

		assert_eq!(first, Some(FeedBatch { events: vec![1, 2], position: Some("p1".into()) }));
		assert_eq!(pages.cursor().position(), None);

		let second = pages.next_batch().await.expect("Second page should load.");

		assert_eq!(second.map(|batch| batch.events), Some(vec![3]));
		assert_eq!(pages.cursor().position(), Some("p1"));
		assert!(pages.next_batch().await.expect("Empty page should load.").is_none());
		assert!(pages.is_exhausted());
		assert!(pages.next_batch().await.expect("Exhausted pages stay empty.").is_none());
		assert_eq!(source.requested().len(), 3);
		assert_eq!(cursor.position(), Some("p3"));
	}
}
