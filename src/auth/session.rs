//! Bearer session record and freshness checks.

// self
use crate::{_prelude::*, auth::Secret};

/// Current lifecycle status for a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
	/// Token is younger than its lifetime and can be reused.
	Fresh,
	/// Token reached its lifetime and must be replaced by a new login.
	Stale,
}

/// Bearer token obtained by a login exchange.
#[derive(Clone)]
pub struct Session {
	/// Bearer token sent verbatim in the `Authorization` header.
	pub token: Secret,
	/// Instant the login exchange completed.
	pub obtained_at: OffsetDateTime,
	/// Lifetime after which the token is refreshed.
	pub ttl: Duration,
}
impl Session {
	/// Creates a session for a freshly issued token.
	pub fn new(token: impl Into<Secret>, obtained_at: OffsetDateTime, ttl: Duration) -> Self {
		Self { token: token.into(), obtained_at, ttl }
	}

	/// Computes the status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> SessionStatus {
		if instant - self.obtained_at < self.ttl {
			SessionStatus::Fresh
		} else {
			SessionStatus::Stale
		}
	}

	/// Returns `true` if the token can be reused at the provided instant.
	pub fn is_fresh_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), SessionStatus::Fresh)
	}

	/// Instant after which the session is stale.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.obtained_at + self.ttl
	}
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("token", &"<redacted>")
			.field("obtained_at", &self.obtained_at)
			.field("ttl", &self.ttl)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn freshness_follows_ttl_boundary() {
		let obtained = datetime!(2025-01-01 00:00 UTC);
		let session = Session::new("token", obtained, Duration::hours(23));

		assert!(session.is_fresh_at(obtained));
		assert!(session.is_fresh_at(obtained + Duration::hours(22)));
		assert_eq!(session.status_at(obtained + Duration::hours(23)), SessionStatus::Stale);
		assert_eq!(session.expires_at(), obtained + Duration::hours(23));
	}

	#[test]
	fn debug_redacts_token() {
		let session = Session::new("bearer-value", OffsetDateTime::UNIX_EPOCH, Duration::hours(1));

		assert!(!format!("{session:?}").contains("bearer-value"));
	}
}
