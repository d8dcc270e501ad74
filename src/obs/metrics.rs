// self
use crate::obs::{OpKind, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"twikey_client_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the number of feed events dispatched by a drain (when enabled).
pub fn record_feed_events(feed: &'static str, events: u64) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("twikey_client_feed_events_total", "feed" => feed).increment(events);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (feed, events);
	}
}
