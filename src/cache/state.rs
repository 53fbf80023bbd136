//! Cache state machine modelling the remote key set lifecycle.

// crates.io
use jsonwebtoken::jwk::JwkSet;
// self
use crate::_prelude::*;

/// Metadata captured for a fetched key set.
#[derive(Clone, Debug)]
pub struct CachePayload {
	/// Key set served to lookups.
	pub jwks: Arc<JwkSet>,
	/// Strong or weak validator supplied by the origin.
	pub etag: Option<String>,
	/// Last-Modified timestamp advertised by the origin.
	pub last_modified: Option<DateTime<Utc>>,
	/// UTC timestamp when the payload was most recently fetched or revalidated.
	pub last_refresh_at: DateTime<Utc>,
	/// Monotonic instant of the most recent successful fetch or revalidation.
	pub fetched_at: Instant,
	/// Monotonic deadline after which the payload must be refetched before use; `None` never
	/// expires.
	pub expires_at: Option<Instant>,
}
impl CachePayload {
	/// Whether the payload has exceeded its configured max age.
	pub fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.is_some_and(|expires_at| now >= expires_at)
	}
}

/// Cache lifecycle states.
#[derive(Clone, Debug)]
pub enum CacheState {
	/// Nothing has been fetched yet.
	Empty,
	/// A key set is available.
	Ready(CachePayload),
	/// The last fetch failed; fetching is suppressed until `retry_at`, or for good when it is
	/// `None`.
	///
	/// A previously fetched payload, if any, keeps being served during the cooldown.
	CoolingDown {
		/// Payload retained from an earlier successful fetch.
		stale: Option<CachePayload>,
		/// Monotonic instant at which fetching may resume.
		retry_at: Option<Instant>,
	},
}
impl CacheState {
	/// Retrieve the current payload if available.
	pub fn payload(&self) -> Option<&CachePayload> {
		match self {
			CacheState::Ready(payload) => Some(payload),
			CacheState::CoolingDown { stale, .. } => stale.as_ref(),
			CacheState::Empty => None,
		}
	}

	/// Remaining cooldown at `now`, if fetching is currently suppressed.
	pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
		match self {
			CacheState::CoolingDown { retry_at: Some(retry_at), .. } if now < *retry_at =>
				Some(*retry_at - now),
			CacheState::CoolingDown { retry_at: None, .. } => Some(Duration::MAX),
			_ => None,
		}
	}
}
