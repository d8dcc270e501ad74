//! Mandate feed classification and mandate detail lookups.
//!
//! Each item of the `Messages` envelope is one of three lifecycle events, told apart by the
//! reason objects it carries:
//!
//! | `AmdmntRsn` | `CxlRsn` | Event |
//! |---|---|---|
//! | absent | absent | [`MandateEvent::New`] |
//! | present | absent | [`MandateEvent::Update`] |
//! | absent | present | [`MandateEvent::Cancel`] |
//! | present | present | [`DecodingError::AmbiguousItem`] |

// crates.io
use http::{HeaderMap, HeaderName, Method};
use time::format_description::well_known::Rfc3339;
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	client::{self, Client, RequestBody},
	error::DecodingError,
	feed::{self, DrainSummary, FeedCursor, FeedDecoder, FeedDispatcher, FeedPages, HandlerResult},
	feeds::{self, ClientPageSource, FeedKind, FeedOptions},
	transport::ApiTransport,
};

/// Path of the single-mandate lookup.
pub const MANDATE_DETAIL_PATH: &str = "/creditor/mandate/detail";
/// Response header carrying the mandate state on detail lookups.
pub const STATE_HEADER: HeaderName = HeaderName::from_static("x-state");
/// Response header carrying the collectable flag on detail lookups.
pub const COLLECTABLE_HEADER: HeaderName = HeaderName::from_static("x-collectable");

/// Reason attached to an amendment or cancellation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReason {
	/// Reason code, e.g. `_T50` for an account change.
	#[serde(rename = "Rsn")]
	pub code: String,
	/// Any other fields of the reason object.
	#[serde(flatten)]
	pub details: BTreeMap<String, Value>,
}

/// A mandate that was signed or imported.
#[derive(Clone, Debug, PartialEq)]
pub struct NewMandate {
	/// Mandate document (`Mndt`).
	pub mandate: Value,
	/// Event time as reported (`EvtTime`).
	pub event_time: String,
	/// Raw feed item.
	pub raw: Value,
}

/// An amendment of an existing mandate.
#[derive(Clone, Debug, PartialEq)]
pub struct MandateUpdate {
	/// Identifier of the amended mandate (`OrgnlMndtId`).
	pub original_id: String,
	/// Mandate document after the amendment (`Mndt`).
	pub mandate: Value,
	/// Amendment reason (`AmdmntRsn`).
	pub reason: ChangeReason,
	/// Event time as reported (`EvtTime`).
	pub event_time: String,
	/// Raw feed item.
	pub raw: Value,
}

/// A cancelled mandate.
#[derive(Clone, Debug, PartialEq)]
pub struct MandateCancel {
	/// Identifier of the cancelled mandate (`OrgnlMndtId`).
	pub original_id: String,
	/// Cancellation reason (`CxlRsn`).
	pub reason: ChangeReason,
	/// Mandate snapshot, when the feed was asked to include it.
	pub mandate: Option<Value>,
	/// Event time as reported (`EvtTime`).
	pub event_time: String,
	/// Raw feed item.
	pub raw: Value,
}

/// Classified mandate feed item.
#[derive(Clone, Debug, PartialEq)]
pub enum MandateEvent {
	/// New mandate.
	New(NewMandate),
	/// Amended mandate.
	Update(MandateUpdate),
	/// Cancelled mandate.
	Cancel(MandateCancel),
}
impl MandateEvent {
	/// Event time as reported by the feed.
	pub fn event_time(&self) -> &str {
		match self {
			Self::New(event) => &event.event_time,
			Self::Update(event) => &event.event_time,
			Self::Cancel(event) => &event.event_time,
		}
	}

	/// Event time parsed as RFC 3339, when it has that shape.
	pub fn occurred_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::parse(self.event_time(), &Rfc3339).ok()
	}

	/// Reason code for updates and cancellations.
	pub fn reason_code(&self) -> Option<&str> {
		match self {
			Self::New(_) => None,
			Self::Update(event) => Some(&event.reason.code),
			Self::Cancel(event) => Some(&event.reason.code),
		}
	}

	/// Raw feed item.
	pub fn raw(&self) -> &Value {
		match self {
			Self::New(event) => &event.raw,
			Self::Update(event) => &event.raw,
			Self::Cancel(event) => &event.raw,
		}
	}
}

/// Receives classified mandate events.
pub trait MandateFeedHandler {
	/// Called once per page with the reported position and the number of items.
	fn start(&mut self, position: Option<&str>, count: usize) -> HandlerResult {
		let _ = (position, count);

		Ok(())
	}

	/// Handles a new mandate.
	fn handle_new(&mut self, event: NewMandate) -> HandlerResult;

	/// Handles an amended mandate.
	fn handle_update(&mut self, event: MandateUpdate) -> HandlerResult;

	/// Handles a cancelled mandate.
	fn handle_cancel(&mut self, event: MandateCancel) -> HandlerResult;
}

/// Decodes mandate feed pages into [`MandateEvent`] values.
#[derive(Clone, Copy, Debug, Default)]
pub struct MandateDecoder;
impl FeedDecoder for MandateDecoder {
	type Event = MandateEvent;

	fn decode(&self, body: &[u8]) -> Result<Vec<MandateEvent>> {
		feeds::envelope_items(FeedKind::Mandate, body)?
			.into_iter()
			.enumerate()
			.map(|(index, item)| classify(index, item))
			.collect()
	}
}

#[derive(Deserialize)]
struct WireItem {
	#[serde(rename = "Mndt")]
	mandate: Option<Value>,
	#[serde(rename = "EvtTime")]
	event_time: Option<String>,
	#[serde(rename = "AmdmntRsn")]
	amendment: Option<ChangeReason>,
	#[serde(rename = "CxlRsn")]
	cancellation: Option<ChangeReason>,
	#[serde(rename = "OrgnlMndtId")]
	original_id: Option<String>,
}

/// Classifies one raw mandate feed item.
pub fn classify(index: usize, item: Value) -> Result<MandateEvent> {
	let wire: WireItem = serde_path_to_error::deserialize(&item).map_err(|source| {
		DecodingError::Item { feed: FeedKind::Mandate.label(), index, source }
	})?;
	let event = match (wire.amendment, wire.cancellation) {
		(Some(_), Some(_)) => return Err(DecodingError::AmbiguousItem { index }.into()),
		(None, None) => MandateEvent::New(NewMandate {
			mandate: required(wire.mandate, index, "Mndt")?,
			event_time: required(wire.event_time, index, "EvtTime")?,
			raw: item,
		}),
		(Some(reason), None) => MandateEvent::Update(MandateUpdate {
			original_id: required(wire.original_id, index, "OrgnlMndtId")?,
			mandate: required(wire.mandate, index, "Mndt")?,
			reason,
			event_time: required(wire.event_time, index, "EvtTime")?,
			raw: item,
		}),
		(None, Some(reason)) => MandateEvent::Cancel(MandateCancel {
			original_id: required(wire.original_id, index, "OrgnlMndtId")?,
			reason,
			mandate: wire.mandate,
			event_time: required(wire.event_time, index, "EvtTime")?,
			raw: item,
		}),
	};

	Ok(event)
}

fn required<T>(value: Option<T>, index: usize, field: &'static str) -> Result<T, DecodingError> {
	value.ok_or(DecodingError::MissingField { index, field })
}

struct MandateDispatch<'h, H>(&'h mut H)
where
	H: ?Sized;
impl<H> FeedDispatcher<MandateEvent> for MandateDispatch<'_, H>
where
	H: ?Sized + MandateFeedHandler,
{
	fn start(&mut self, position: Option<&str>, count: usize) -> HandlerResult {
		self.0.start(position, count)
	}

	fn dispatch(&mut self, event: MandateEvent) -> HandlerResult {
		match event {
			MandateEvent::New(event) => self.0.handle_new(event),
			MandateEvent::Update(event) => self.0.handle_update(event),
			MandateEvent::Cancel(event) => self.0.handle_cancel(event),
		}
	}
}

impl<C> Client<C>
where
	C: ?Sized + ApiTransport,
{
	/// Drains the mandate feed into `handler`.
	pub async fn mandate_feed<H>(
		&self,
		cursor: &mut FeedCursor,
		handler: &mut H,
		options: &FeedOptions,
	) -> Result<DrainSummary>
	where
		H: ?Sized + MandateFeedHandler,
	{
		let source = ClientPageSource::new(self, FeedKind::Mandate, options);

		feed::drain(
			cursor,
			&source,
			MandateDecoder,
			&mut MandateDispatch(handler),
			options.signal.as_ref(),
		)
		.await
	}

	/// Reads the mandate feed as a lazy sequence of batches.
	pub fn mandate_pages<'a>(
		&'a self,
		cursor: &'a mut FeedCursor,
		options: &FeedOptions,
	) -> FeedPages<'a, ClientPageSource<'a, C>, MandateDecoder> {
		FeedPages::new(ClientPageSource::new(self, FeedKind::Mandate, options), MandateDecoder, cursor)
	}

	/// Fetches one mandate.
	///
	/// The `X-STATE` and `X-COLLECTABLE` response headers are merged into the `Mndt` object as
	/// `State` and boolean `Collectable`. `force` asks the API to return the mandate even when it
	/// is not in a final state.
	pub async fn mandate_detail(&self, mandate_id: &str, force: bool) -> Result<Value> {
		let mut query = FormSerializer::new(String::new());

		query.append_pair("mndtId", mandate_id);

		if force {
			query.append_pair("force", "true");
		}

		let path = format!("{MANDATE_DETAIL_PATH}?{}", query.finish());
		let response =
			self.execute(Method::GET, &path, RequestBody::Empty, HeaderMap::new()).await?;

		client::check_response(&response)?;

		let header = |name: &HeaderName| {
			response.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
		};
		let state = header(&STATE_HEADER);
		let collectable = header(&COLLECTABLE_HEADER);
		let mut body: Value = client::decode_body(response.body())?;

		if let Some(Value::Object(mandate)) = body.get_mut("Mndt") {
			if let Some(state) = state {
				mandate.insert("State".into(), Value::String(state));
			}
			if let Some(collectable) = collectable {
				mandate.insert("Collectable".into(), Value::Bool(collectable == "true"));
			}
		}

		Ok(body)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn decode(items: Value) -> Result<Vec<MandateEvent>> {
		let body = serde_json::to_vec(&json!({ "Messages": items }))
			.expect("Test envelope should serialize.");

		MandateDecoder.decode(&body)
	}

	#[test]
	fn items_are_classified_by_reason() {
		let events = decode(json!([
			{ "Mndt": { "MndtId": "M1" }, "EvtTime": "2024-05-01T10:00:00Z" },
			{
				"OrgnlMndtId": "M1",
				"Mndt": { "MndtId": "M1" },
				"AmdmntRsn": { "Rsn": "_T50", "Orgtr": "debtor" },
				"EvtTime": "2024-05-02T10:00:00Z"
			},
			{ "OrgnlMndtId": "M2", "CxlRsn": { "Rsn": "MD16" }, "EvtTime": "2024-05-03T10:00:00Z" }
		]))
		.expect("Mandate page should decode.");

		assert_eq!(events.len(), 3);
		assert!(matches!(&events[0], MandateEvent::New(event) if event.mandate["MndtId"] == "M1"));
		assert!(matches!(
			&events[1],
			MandateEvent::Update(event)
				if event.original_id == "M1"
					&& event.reason.code == "_T50"
					&& event.reason.details.get("Orgtr") == Some(&json!("debtor"))
		));
		assert!(matches!(
			&events[2],
			MandateEvent::Cancel(event) if event.original_id == "M2" && event.mandate.is_none()
		));
		assert_eq!(events[2].reason_code(), Some("MD16"));
		assert_eq!(events[0].reason_code(), None);
		assert_eq!(
			events[0].occurred_at(),
			Some(time::macros::datetime!(2024-05-01 10:00:00 UTC))
		);
	}

	#[test]
	fn both_reasons_are_ambiguous() {
		let err = decode(json!([
			{ "Mndt": {}, "EvtTime": "t" },
			{
				"OrgnlMndtId": "M1",
				"Mndt": {},
				"AmdmntRsn": { "Rsn": "_T50" },
				"CxlRsn": { "Rsn": "MD16" },
				"EvtTime": "t"
			}
		]))
		.expect_err("Both reasons should fail.");

		assert!(matches!(err, Error::Decoding(DecodingError::AmbiguousItem { index: 1 })));
	}

	#[test]
	fn missing_required_fields_fail() {
		let err = decode(json!([{ "AmdmntRsn": { "Rsn": "_T50" }, "Mndt": {}, "EvtTime": "t" }]))
			.expect_err("Update without the original id should fail.");

		assert!(matches!(
			err,
			Error::Decoding(DecodingError::MissingField { index: 0, field: "OrgnlMndtId" })
		));

		let err = decode(json!([{ "EvtTime": "t" }])).expect_err("New without a mandate should fail.");

		assert!(matches!(
			err,
			Error::Decoding(DecodingError::MissingField { index: 0, field: "Mndt" })
		));

		let err = decode(json!([{ "Mndt": {}, "EvtTime": 5 }]))
			.expect_err("Non-string event time should fail.");

		assert!(matches!(err, Error::Decoding(DecodingError::Item { index: 0, .. })));
	}

	#[test]
	fn null_reasons_read_as_absent() {
		let events = decode(json!([{ "Mndt": {}, "EvtTime": "t", "AmdmntRsn": null, "CxlRsn": null }]))
			.expect("Null reasons should decode.");

		assert!(matches!(events[0], MandateEvent::New(_)));
		assert_eq!(events[0].occurred_at(), None);
	}
}
