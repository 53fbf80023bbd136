//! Offline key sets supplied through process configuration.

// crates.io
use jsonwebtoken::{DecodingKey, Header, jwk::JwkSet};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	keys,
	provider::{KeyResolver, KeySetProvider},
};

/// Reason a configured local key set cannot be used.
///
/// Both variants are recoverable: the selector falls back to the remote source.
#[derive(Debug, thiserror::Error)]
pub enum LocalPayloadError {
	/// The payload is not valid JSON.
	#[error("Local JWKS is not valid JSON: {0}")]
	Malformed(#[source] serde_json::Error),
	/// The payload is JSON but the local constructor rejected it.
	#[error("Local JWKS was rejected: {0}")]
	Rejected(#[source] Error),
}
impl LocalPayloadError {
	/// Short, stable label for logs and metrics.
	pub fn reason(&self) -> &'static str {
		match self {
			Self::Malformed(_) => "malformed",
			Self::Rejected(_) => "rejected",
		}
	}
}

/// Key set held in memory; lookups never touch the network.
#[derive(Clone, Debug)]
pub struct LocalJwkSet {
	jwks: Arc<JwkSet>,
}
impl LocalJwkSet {
	/// Validate a parsed JSON payload and build the key set from it.
	pub fn from_value(payload: Value) -> Result<Self> {
		Ok(Self::from_jwk_set(keys::parse_key_set(payload)?))
	}

	/// Wrap an already parsed key set.
	pub fn from_jwk_set(jwks: JwkSet) -> Self {
		Self { jwks: Arc::new(jwks) }
	}

	/// Keys in the set.
	pub fn jwks(&self) -> &JwkSet {
		&self.jwks
	}

	/// Import the key matching the token header.
	pub fn get_key(&self, header: &Header) -> Result<DecodingKey> {
		keys::decoding_key(&self.jwks, header)
	}
}

/// Parse the raw local payload and hand it to the provider's local constructor.
pub fn load_local<P>(raw: &str, provider: &P) -> std::result::Result<KeyResolver, LocalPayloadError>
where
	P: ?Sized + KeySetProvider,
{
	let payload = serde_json::from_str::<Value>(raw).map_err(LocalPayloadError::Malformed)?;

	provider.local(payload).map_err(LocalPayloadError::Rejected)
}
