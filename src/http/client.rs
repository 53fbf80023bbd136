//! HTTP client integration for JWKS retrieval.

// std
use std::collections::BTreeMap;
// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, StatusCode,
	header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED},
};
use jsonwebtoken::jwk::JwkSet;
use reqwest::{Client, Response, redirect::Policy};
use url::Url;
// self
use crate::{_prelude::*, cache::state::CachePayload, keys};

/// Size guard for JWKS response bodies (1 MiB).
pub const MAX_RESPONSE_BYTES: usize = 1_048_576;
/// Portion of an error response body kept for diagnostics.
pub const MAX_ERROR_BODY_BYTES: usize = 4_096;
/// Maximum redirect depth followed while fetching.
pub const MAX_REDIRECTS: usize = 3;

/// Outcome of a JWKS HTTP fetch (200 or 304).
#[derive(Clone, Debug)]
pub struct HttpFetch {
	/// Status returned by the origin.
	pub status: StatusCode,
	/// Parsed key set when the origin returned content; `None` on 304.
	pub jwks: Option<Arc<JwkSet>>,
	/// Entity tag validator advertised by the origin.
	pub etag: Option<String>,
	/// Last-Modified timestamp advertised by the origin.
	pub last_modified: Option<DateTime<Utc>>,
	/// Round-trip duration of the exchange.
	pub elapsed: Duration,
}

/// Build the HTTP client shared by a remote key set.
pub fn build_client() -> Result<Client> {
	Ok(Client::builder()
		.redirect(Policy::limited(MAX_REDIRECTS))
		.connect_timeout(Duration::from_secs(5))
		.build()?)
}

/// Convert configured header pairs into a validated [`HeaderMap`].
pub fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
	let mut map = HeaderMap::with_capacity(headers.len());

	for (name, value) in headers {
		let name = HeaderName::from_bytes(name.as_bytes()).map_err(http::Error::from)?;
		let value = HeaderValue::from_str(value).map_err(http::Error::from)?;

		map.insert(name, value);
	}

	Ok(map)
}

/// Fetch the key set at `url`, revalidating against `previous` when one is cached.
#[tracing::instrument(
	skip(client, url, headers, previous),
	fields(jwks_url = %url, revalidate = previous.is_some())
)]
pub async fn fetch_jwks(
	client: &Client,
	url: &Url,
	headers: &HeaderMap,
	timeout: Duration,
	previous: Option<&CachePayload>,
) -> Result<HttpFetch> {
	let mut builder = client.get(url.clone()).headers(headers.clone()).timeout(timeout);

	if let Some(payload) = previous {
		if let Some(etag) = &payload.etag
			&& let Ok(value) = HeaderValue::from_str(etag)
		{
			builder = builder.header(IF_NONE_MATCH, value);
		}
		if let Some(last_modified) = payload.last_modified {
			builder = builder.header(IF_MODIFIED_SINCE, httpdate::fmt_http_date(last_modified.into()));
		}
	}

	let start = Instant::now();
	let mut response = builder.send().await?;
	let elapsed = start.elapsed();
	let status = response.status();
	let etag = response
		.headers()
		.get(ETAG)
		.and_then(|value| value.to_str().ok())
		.map(|s| s.to_string());
	let last_modified = response
		.headers()
		.get(LAST_MODIFIED)
		.and_then(|value| value.to_str().ok())
		.and_then(|raw| httpdate::parse_http_date(raw).ok())
		.map(DateTime::<Utc>::from);

	if status == StatusCode::NOT_MODIFIED && previous.is_some() {
		tracing::debug!(jwks_url = %url, elapsed = ?elapsed, "jwks not modified");

		return Ok(HttpFetch { status, jwks: None, etag, last_modified, elapsed });
	}
	if !status.is_success() {
		let body = read_capped(&mut response, MAX_ERROR_BODY_BYTES)
			.await
			.ok()
			.map(|(bytes, _)| String::from_utf8_lossy(&bytes).into_owned());

		return Err(Error::HttpStatus { status, url: url.clone(), body });
	}
	if let Some(length) = response.content_length()
		&& length > MAX_RESPONSE_BYTES as u64
	{
		return Err(oversized(length));
	}

	let (bytes, truncated) = read_capped(&mut response, MAX_RESPONSE_BYTES).await?;

	if truncated {
		return Err(oversized(bytes.len() as u64));
	}

	let jwks = keys::parse_key_set(serde_json::from_slice(&bytes)?)?;

	tracing::debug!(
		jwks_url = %url,
		status = %status,
		keys = jwks.keys.len(),
		elapsed = ?elapsed,
		"jwks fetch complete"
	);

	Ok(HttpFetch { status, jwks: Some(Arc::new(jwks)), etag, last_modified, elapsed })
}

/// Read at most `limit` bytes of the body; the flag reports whether more remained.
async fn read_capped(response: &mut Response, limit: usize) -> Result<(Vec<u8>, bool)> {
	let mut body = Vec::new();

	while let Some(chunk) = response.chunk().await? {
		let room = limit - body.len();

		if chunk.len() > room {
			body.extend_from_slice(&chunk[..room]);

			return Ok((body, true));
		}

		body.extend_from_slice(&chunk);
	}

	Ok((body, false))
}

fn oversized(size: u64) -> Error {
	Error::Validation {
		field: "response",
		reason: format!(
			"Response size of at least {size} bytes exceeds the guard of {MAX_RESPONSE_BYTES} bytes."
		),
	}
}
