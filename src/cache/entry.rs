//! Cache entry definitions and state transition helpers.

// self
use crate::{
	_prelude::*,
	cache::state::{CachePayload, CacheState},
};

/// Cached key set for a single JWKS endpoint, plus fetch bookkeeping.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	state: CacheState,
	last_attempt_at: Option<Instant>,
	error_count: u32,
}
impl CacheEntry {
	/// Create a new empty cache entry.
	pub fn new() -> Self {
		Self { state: CacheState::Empty, last_attempt_at: None, error_count: 0 }
	}

	/// Inspect the current cache state.
	pub fn state(&self) -> &CacheState {
		&self.state
	}

	/// Count of consecutive failed fetches.
	pub fn error_count(&self) -> u32 {
		self.error_count
	}

	/// Record the start of a fetch attempt.
	pub fn begin_attempt(&mut self, now: Instant) {
		self.last_attempt_at = Some(now);
	}

	/// Whether an attempt was started within `cooldown` of `now`.
	pub fn attempted_within(&self, now: Instant, cooldown: Duration) -> bool {
		self.last_attempt_at
			.map(|at| now.saturating_duration_since(at) < cooldown)
			.unwrap_or(false)
	}

	/// Record a successful fetch or revalidation.
	pub fn fetch_success(&mut self, payload: CachePayload) {
		self.error_count = 0;
		self.state = CacheState::Ready(payload);
	}

	/// Record a failed fetch and enter the cooldown window.
	///
	/// Any payload held so far is retained for stale serving.
	pub fn fetch_failure(&mut self, now: Instant, cooldown: Duration) {
		let retry_at = now.checked_add(cooldown);

		self.error_count = self.error_count.saturating_add(1);
		self.state = match std::mem::replace(&mut self.state, CacheState::Empty) {
			CacheState::Ready(payload) => CacheState::CoolingDown { stale: Some(payload), retry_at },
			CacheState::CoolingDown { stale, .. } => CacheState::CoolingDown { stale, retry_at },
			CacheState::Empty => CacheState::CoolingDown { stale: None, retry_at },
		};
	}

	/// Retrieve a clone of the cached payload if present.
	pub fn snapshot(&self) -> Option<CachePayload> {
		self.state.payload().cloned()
	}
}
impl Default for CacheEntry {
	fn default() -> Self {
		Self::new()
	}
}
