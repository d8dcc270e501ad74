// self
use crate::_prelude::*;

/// Caller-owned resume point of a change feed.
///
/// The cursor is plain data: persist it between runs and hand it back to resume where the last
/// drain stopped. An empty cursor starts from the server-side default position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedCursor {
	/// Opaque position reported by the last fully handled page.
	pub last_position: Option<String>,
}
impl FeedCursor {
	/// Creates an empty cursor.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a cursor that resumes after the given position; blank values mean "start".
	pub fn resume_after(position: impl Into<String>) -> Self {
		let mut cursor = Self::new();

		cursor.advance(Some(position.into()));

		cursor
	}

	/// Position sent as the resume header, if any.
	pub fn position(&self) -> Option<&str> {
		self.last_position.as_deref()
	}

	/// Moves the cursor to a newly reported position.
	///
	/// Missing or blank positions leave the cursor unchanged.
	pub fn advance(&mut self, position: Option<String>) {
		if let Some(position) = position.filter(|p| !p.trim().is_empty()) {
			self.last_position = Some(position);
		}
	}

	/// Forgets the stored position.
	pub fn reset(&mut self) {
		self.last_position = None;
	}
}
