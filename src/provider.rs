//! Key resolver handle and the constructors that back it.

// crates.io
use jsonwebtoken::{DecodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
// self
use crate::{_prelude::*, config::RemoteFetchConfig, local::LocalJwkSet, remote::RemoteJwkSet};

/// Origin of the keys behind a [`KeyResolver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
	/// Keys supplied offline through configuration.
	Local,
	/// Keys fetched from the Cognito JWKS endpoint.
	Remote,
}
impl KeySource {
	/// Stable label for logs and metrics.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Local => "local",
			Self::Remote => "remote",
		}
	}
}

/// Immutable handle mapping a token header to its verification key.
///
/// Backed by exactly one source. Cloning is cheap and clones share the remote cache.
#[derive(Clone, Debug)]
pub struct KeyResolver {
	inner: Arc<ResolverKind>,
}
impl KeyResolver {
	/// Resolver backed by an in-memory key set.
	pub fn local(jwks: LocalJwkSet) -> Self {
		Self { inner: Arc::new(ResolverKind::Local(jwks)) }
	}

	/// Resolver backed by a remote, lazily fetched key set.
	pub fn remote(jwks: RemoteJwkSet) -> Self {
		Self { inner: Arc::new(ResolverKind::Remote(jwks)) }
	}

	/// Which source backs this resolver.
	pub fn source(&self) -> KeySource {
		match self.inner.as_ref() {
			ResolverKind::Local(_) => KeySource::Local,
			ResolverKind::Remote(_) => KeySource::Remote,
		}
	}

	/// JWKS endpoint for remote resolvers.
	pub fn jwks_url(&self) -> Option<&Url> {
		match self.inner.as_ref() {
			ResolverKind::Local(_) => None,
			ResolverKind::Remote(remote) => Some(remote.jwks_url()),
		}
	}

	/// The remote key set, when this resolver is remote.
	pub fn as_remote(&self) -> Option<&RemoteJwkSet> {
		match self.inner.as_ref() {
			ResolverKind::Remote(remote) => Some(remote),
			ResolverKind::Local(_) => None,
		}
	}

	/// Resolve the verification key for a token header.
	pub async fn get_key(&self, header: &Header) -> Result<DecodingKey> {
		match self.inner.as_ref() {
			ResolverKind::Local(local) => local.get_key(header),
			ResolverKind::Remote(remote) => remote.get_key(header).await,
		}
	}

	/// Decode the token header and resolve its verification key.
	pub async fn key_for_token(&self, token: &str) -> Result<DecodingKey> {
		let header = jsonwebtoken::decode_header(token)?;

		self.get_key(&header).await
	}
}

#[derive(Debug)]
enum ResolverKind {
	Local(LocalJwkSet),
	Remote(RemoteJwkSet),
}

/// Constructors for the two kinds of key source.
///
/// Implementations must fail on payloads they cannot use so the selector can fall back.
pub trait KeySetProvider {
	/// Build a resolver from a parsed local key set payload.
	fn local(&self, payload: Value) -> Result<KeyResolver>;

	/// Build a resolver that fetches keys from `jwks_url` on demand.
	fn remote(&self, jwks_url: Url, config: RemoteFetchConfig) -> Result<KeyResolver>;
}
impl<P> KeySetProvider for &P
where
	P: ?Sized + KeySetProvider,
{
	fn local(&self, payload: Value) -> Result<KeyResolver> {
		(**self).local(payload)
	}

	fn remote(&self, jwks_url: Url, config: RemoteFetchConfig) -> Result<KeyResolver> {
		(**self).remote(jwks_url, config)
	}
}

/// Production constructors backed by [`LocalJwkSet`] and [`RemoteJwkSet`].
#[derive(Clone, Debug, Default)]
pub struct DefaultKeySetProvider {
	client: Option<Client>,
}
impl DefaultKeySetProvider {
	/// Share the supplied HTTP client across every remote key set.
	pub fn with_client(client: Client) -> Self {
		Self { client: Some(client) }
	}
}
impl KeySetProvider for DefaultKeySetProvider {
	fn local(&self, payload: Value) -> Result<KeyResolver> {
		Ok(KeyResolver::local(LocalJwkSet::from_value(payload)?))
	}

	fn remote(&self, jwks_url: Url, config: RemoteFetchConfig) -> Result<KeyResolver> {
		let remote = match &self.client {
			Some(client) => RemoteJwkSet::with_client(jwks_url, config, client.clone())?,
			None => RemoteJwkSet::new(jwks_url, config)?,
		};

		Ok(KeyResolver::remote(remote))
	}
}
