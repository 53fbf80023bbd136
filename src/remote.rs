//! Remote key set with lazy fetching, max-age caching, and failure cooldown.

// crates.io
use http::HeaderMap;
use jsonwebtoken::{DecodingKey, Header, jwk::JwkSet};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use url::Url;
// self
use crate::{
	_prelude::*,
	cache::{
		entry::CacheEntry,
		state::{CachePayload, CacheState},
	},
	config::RemoteFetchConfig,
	http::client::{self, fetch_jwks},
	keys, metrics,
};

/// Key set fetched from a JWKS endpoint on first use and refreshed by age.
///
/// Construction performs no I/O. Clones share the cache and the single-flight guard.
#[derive(Clone, Debug)]
pub struct RemoteJwkSet {
	jwks_url: Arc<Url>,
	config: Arc<RemoteFetchConfig>,
	headers: Arc<HeaderMap>,
	client: Client,
	entry: Arc<RwLock<CacheEntry>>,
	single_flight: Arc<Mutex<()>>,
}
impl RemoteJwkSet {
	/// Build a remote key set with its own HTTP client.
	pub fn new(jwks_url: Url, config: RemoteFetchConfig) -> Result<Self> {
		let client = client::build_client()?;

		Self::with_client(jwks_url, config, client)
	}

	/// Build a remote key set using the supplied HTTP client.
	pub fn with_client(jwks_url: Url, config: RemoteFetchConfig, client: Client) -> Result<Self> {
		let headers = client::header_map(&config.headers)?;

		Ok(Self {
			jwks_url: Arc::new(jwks_url),
			config: Arc::new(config),
			headers: Arc::new(headers),
			client,
			entry: Arc::new(RwLock::new(CacheEntry::new())),
			single_flight: Arc::new(Mutex::new(())),
		})
	}

	/// JWKS endpoint this set fetches from.
	pub fn jwks_url(&self) -> &Url {
		&self.jwks_url
	}

	/// Effective fetch configuration.
	pub fn config(&self) -> &RemoteFetchConfig {
		&self.config
	}

	/// Resolve the verification key for a token header.
	///
	/// A `kid` miss against a cached set triggers one refetch unless a fetch was attempted within
	/// the cooldown.
	#[tracing::instrument(
		skip(self, header),
		fields(jwks_url = %self.jwks_url, kid = header.kid.as_deref().unwrap_or_default())
	)]
	pub async fn get_key(&self, header: &Header) -> Result<DecodingKey> {
		let jwks = self.jwks().await?;
		let result = keys::decoding_key(&jwks, header);

		if matches!(result, Err(Error::NoMatchingKey { .. })) && self.may_refetch().await {
			tracing::debug!("no matching key in cached set; refetching");

			let refreshed = self.refresh(Some(&jwks)).await?;

			return keys::decoding_key(&refreshed, header);
		}

		result
	}

	/// Current key set, fetching it when missing or older than the configured max age.
	pub async fn jwks(&self) -> Result<Arc<JwkSet>> {
		let now = Instant::now();
		let cached = {
			let entry = self.entry.read().await;

			match entry.state() {
				CacheState::Ready(payload) if !payload.is_expired(now) => Some(payload.jwks.clone()),
				state => match state.cooldown_remaining(now) {
					Some(remaining) => match state.payload() {
						Some(stale) => {
							metrics::record_lookup_hit(self.jwks_url.as_str(), true);

							return Ok(stale.jwks.clone());
						},
						None => return Err(self.cooldown_error(remaining)),
					},
					None => None,
				},
			}
		};

		match cached {
			Some(jwks) => {
				metrics::record_lookup_hit(self.jwks_url.as_str(), false);

				Ok(jwks)
			},
			None => {
				metrics::record_lookup_miss(self.jwks_url.as_str());

				self.refresh(None).await
			},
		}
	}

	/// Capture the current cache state for diagnostics.
	pub async fn status(&self) -> RemoteStatus {
		let now = Instant::now();
		let entry = self.entry.read().await;
		let state = match entry.state() {
			CacheState::Empty => RemoteState::Empty,
			CacheState::Ready(payload) if payload.is_expired(now) => RemoteState::Expired,
			CacheState::Ready(_) => RemoteState::Ready,
			CacheState::CoolingDown { .. } => RemoteState::CoolingDown,
		};
		let payload = entry.state().payload();

		RemoteStatus {
			jwks_url: self.jwks_url.as_ref().clone(),
			state,
			last_refresh: payload.map(|payload| payload.last_refresh_at),
			key_count: payload.map(|payload| payload.jwks.keys.len()).unwrap_or_default(),
			error_count: entry.error_count(),
			cooldown_remaining: entry.state().cooldown_remaining(now),
		}
	}

	async fn may_refetch(&self) -> bool {
		let entry = self.entry.read().await;

		!entry.attempted_within(Instant::now(), self.config.cooldown)
	}

	/// Fetch under the single-flight guard.
	///
	/// `seen` is the set the caller already found lacking; a different fresh set installed by a
	/// concurrent fetch is returned without another request.
	#[tracing::instrument(
		skip(self, seen),
		fields(jwks_url = %self.jwks_url, kid_miss = seen.is_some())
	)]
	async fn refresh(&self, seen: Option<&Arc<JwkSet>>) -> Result<Arc<JwkSet>> {
		let _guard = self.single_flight.lock().await;
		let now = Instant::now();
		let previous = {
			let entry = self.entry.read().await;
			let state = entry.state();

			if let CacheState::Ready(payload) = state
				&& !payload.is_expired(now)
				&& seen.is_none_or(|seen| !Arc::ptr_eq(seen, &payload.jwks))
			{
				return Ok(payload.jwks.clone());
			}
			if let Some(remaining) = state.cooldown_remaining(now) {
				return match state.payload() {
					Some(stale) => Ok(stale.jwks.clone()),
					None => Err(self.cooldown_error(remaining)),
				};
			}

			entry.snapshot()
		};

		self.entry.write().await.begin_attempt(now);

		let fetch = fetch_jwks(
			&self.client,
			&self.jwks_url,
			&self.headers,
			self.config.timeout,
			previous.as_ref(),
		)
		.await;

		match fetch {
			Ok(fetch) => {
				let fetched_at = Instant::now();
				let (jwks, etag, last_modified) = match (fetch.jwks, previous) {
					(Some(jwks), _) => (jwks, fetch.etag, fetch.last_modified),
					(None, Some(previous)) => (
						previous.jwks,
						fetch.etag.or(previous.etag),
						fetch.last_modified.or(previous.last_modified),
					),
					(None, None) =>
						return Err(Error::InvalidKeySet("Origin returned no key set.".into())),
				};
				let payload = CachePayload {
					jwks: jwks.clone(),
					etag,
					last_modified,
					last_refresh_at: Utc::now(),
					fetched_at,
					expires_at: fetched_at.checked_add(self.config.cache_max_age),
				};

				self.entry.write().await.fetch_success(payload);

				metrics::record_fetch_success(self.jwks_url.as_str(), fetch.elapsed);

				Ok(jwks)
			},
			Err(err) => {
				self.entry.write().await.fetch_failure(Instant::now(), self.config.cooldown);

				metrics::record_fetch_error(self.jwks_url.as_str());

				match previous {
					Some(stale) => {
						tracing::warn!(error = %err, "jwks fetch failed, serving stale keys");

						Ok(stale.jwks)
					},
					None => {
						tracing::warn!(error = %err, "jwks fetch failed");

						Err(err)
					},
				}
			},
		}
	}

	fn cooldown_error(&self, remaining: Duration) -> Error {
		Error::Cooldown { url: self.jwks_url.as_ref().clone(), remaining }
	}
}

/// Public representation of the remote cache lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RemoteState {
	/// Nothing fetched yet.
	Empty,
	/// A fresh key set is cached.
	Ready,
	/// The cached key set is older than the max age and will be refetched on next use.
	Expired,
	/// The last fetch failed and fetching is suppressed.
	CoolingDown,
}

/// Diagnostic snapshot of a [`RemoteJwkSet`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteStatus {
	/// JWKS endpoint.
	pub jwks_url: Url,
	/// Lifecycle state.
	pub state: RemoteState,
	/// Timestamp of the most recent successful fetch or revalidation.
	pub last_refresh: Option<DateTime<Utc>>,
	/// Number of keys currently cached.
	pub key_count: usize,
	/// Consecutive failed fetches.
	pub error_count: u32,
	/// Time left before fetching resumes, while cooling down.
	pub cooldown_remaining: Option<Duration>,
}
