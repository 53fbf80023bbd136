//! Identity coordinate resolution and remote fetch configuration merging.
//!
//! Environment lookups happen once, at the composition root, through [`Environment`]. Everything
//! downstream works on explicit values so repeated resolutions never observe process state.

// std
use std::collections::BTreeMap;
// crates.io
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;
// self
use crate::_prelude::*;

/// Environment variable carrying the AWS region of the user pool.
pub const ENV_AWS_REGION: &str = "AWS_REGION";
/// Environment variable carrying the Cognito user pool identifier.
pub const ENV_COGNITO_USER_POOL_ID: &str = "COGNITO_USER_POOL_ID";
/// Environment variable carrying a raw JSON Web Key Set for offline verification.
pub const ENV_COGNITO_LOCAL_JWKSET: &str = "COGNITO_LOCAL_JWKSET";

/// Default per-request timeout for remote fetches.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Default cooldown between remote fetch attempts.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(300_000);
/// Default maximum age of a fetched key set.
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_millis(3_600_000);
/// Client identifier sent as `User-Agent` unless the caller replaces the headers.
pub const DEFAULT_USER_AGENT: &str = concat!("cognito-jwkset/", env!("CARGO_PKG_VERSION"));

/// Read-only snapshot of the process-wide configuration consumed by the resolver.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
	/// Value of `AWS_REGION`.
	pub aws_region: Option<String>,
	/// Value of `COGNITO_USER_POOL_ID`.
	pub cognito_user_pool_id: Option<String>,
	/// Value of `COGNITO_LOCAL_JWKSET`.
	pub cognito_local_jwkset: Option<String>,
}
impl Environment {
	/// Capture the relevant variables from the current process environment.
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Build a snapshot from an arbitrary lookup; empty values count as absent.
	pub fn from_lookup<F>(mut lookup: F) -> Self
	where
		F: FnMut(&str) -> Option<String>,
	{
		let mut read = |key: &str| lookup(key).filter(|value| !value.is_empty());

		Self {
			aws_region: read(ENV_AWS_REGION),
			cognito_user_pool_id: read(ENV_COGNITO_USER_POOL_ID),
			cognito_local_jwkset: read(ENV_COGNITO_LOCAL_JWKSET),
		}
	}

	/// Set the region.
	pub fn with_region(mut self, region: impl Into<String>) -> Self {
		self.aws_region = Some(region.into());

		self
	}

	/// Set the user pool identifier.
	pub fn with_user_pool_id(mut self, user_pool_id: impl Into<String>) -> Self {
		self.cognito_user_pool_id = Some(user_pool_id.into());

		self
	}

	/// Set the raw local key set payload.
	pub fn with_local_jwkset(mut self, payload: impl Into<String>) -> Self {
		self.cognito_local_jwkset = Some(payload.into());

		self
	}

	/// Raw local key set payload, when configured.
	pub fn local_jwkset(&self) -> Option<&str> {
		self.cognito_local_jwkset.as_deref()
	}
}

/// Caller-supplied overrides for [`RemoteFetchConfig`]; unset fields keep the defaults.
///
/// Durations are (de)serialized as whole milliseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteFetchOverrides {
	/// Per-request timeout.
	#[serde(
		alias = "timeoutDuration",
		serialize_with = "serialize_optional_millis",
		deserialize_with = "deserialize_optional_millis"
	)]
	pub timeout: Option<Duration>,
	/// Minimum interval between fetch attempts after a failure or a key miss.
	#[serde(
		alias = "cooldownDuration",
		serialize_with = "serialize_optional_millis",
		deserialize_with = "deserialize_optional_millis"
	)]
	pub cooldown: Option<Duration>,
	/// Maximum age of a fetched key set before it is refetched.
	#[serde(
		serialize_with = "serialize_optional_millis",
		deserialize_with = "deserialize_optional_millis"
	)]
	pub cache_max_age: Option<Duration>,
	/// Outgoing request headers; replaces the default headers wholesale.
	pub headers: Option<BTreeMap<String, String>>,
}

/// Options accepted by the resolver entry point.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JwkSetOptions {
	/// AWS region of the user pool; takes precedence over `AWS_REGION`.
	pub region: Option<String>,
	/// User pool identifier; takes precedence over `COGNITO_USER_POOL_ID`.
	pub user_pool_id: Option<String>,
	/// Remote fetch tuning.
	#[serde(flatten)]
	pub remote: RemoteFetchOverrides,
}
impl JwkSetOptions {
	/// Create empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Set the region.
	pub fn with_region(mut self, region: impl Into<String>) -> Self {
		self.region = Some(region.into());

		self
	}

	/// Set the user pool identifier.
	pub fn with_user_pool_id(mut self, user_pool_id: impl Into<String>) -> Self {
		self.user_pool_id = Some(user_pool_id.into());

		self
	}

	/// Override the per-request timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.remote.timeout = Some(timeout);

		self
	}

	/// Override the fetch cooldown.
	pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
		self.remote.cooldown = Some(cooldown);

		self
	}

	/// Override the cache max age.
	pub fn with_cache_max_age(mut self, cache_max_age: Duration) -> Self {
		self.remote.cache_max_age = Some(cache_max_age);

		self
	}

	/// Replace the outgoing request headers.
	pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.remote.headers =
			Some(headers.into_iter().map(|(name, value)| (name.into(), value.into())).collect());

		self
	}
}

/// Fully specified remote fetch configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFetchConfig {
	/// Per-request timeout.
	#[serde(serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
	pub timeout: Duration,
	/// Minimum interval between fetch attempts after a failure or a key miss.
	#[serde(serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
	pub cooldown: Duration,
	/// Maximum age of a fetched key set before it is refetched.
	#[serde(serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
	pub cache_max_age: Duration,
	/// Outgoing request headers.
	pub headers: BTreeMap<String, String>,
}
impl RemoteFetchConfig {
	/// Overlay caller overrides onto the production defaults.
	pub fn merged(overrides: &RemoteFetchOverrides) -> Self {
		let defaults = Self::default();

		Self {
			timeout: overrides.timeout.unwrap_or(defaults.timeout),
			cooldown: overrides.cooldown.unwrap_or(defaults.cooldown),
			cache_max_age: overrides.cache_max_age.unwrap_or(defaults.cache_max_age),
			headers: overrides.headers.clone().unwrap_or(defaults.headers),
		}
	}
}
impl Default for RemoteFetchConfig {
	fn default() -> Self {
		Self {
			timeout: DEFAULT_TIMEOUT,
			cooldown: DEFAULT_COOLDOWN,
			cache_max_age: DEFAULT_CACHE_MAX_AGE,
			headers: BTreeMap::from([("User-Agent".to_owned(), DEFAULT_USER_AGENT.to_owned())]),
		}
	}
}

/// Validated (region, user pool id) pair locating a Cognito JWKS endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct IdentityCoordinates {
	region: String,
	user_pool_id: String,
}
impl IdentityCoordinates {
	/// Construct coordinates directly, rejecting empty values.
	pub fn new(region: impl Into<String>, user_pool_id: impl Into<String>) -> Result<Self> {
		let region = region.into();
		let user_pool_id = user_pool_id.into();

		if region.is_empty() || user_pool_id.is_empty() {
			return Err(Error::Configuration);
		}

		Ok(Self { region, user_pool_id })
	}

	/// Resolve coordinates from explicit options first, then the environment.
	///
	/// An option that is present wins even when empty, in which case validation fails.
	pub fn resolve(options: &JwkSetOptions, env: &Environment) -> Result<Self> {
		let region = options.region.as_ref().or(env.aws_region.as_ref());
		let user_pool_id = options.user_pool_id.as_ref().or(env.cognito_user_pool_id.as_ref());

		match (region, user_pool_id) {
			(Some(region), Some(user_pool_id)) => Self::new(region.as_str(), user_pool_id.as_str()),
			_ => Err(Error::Configuration),
		}
	}

	/// AWS region.
	pub fn region(&self) -> &str {
		&self.region
	}

	/// Cognito user pool identifier.
	pub fn user_pool_id(&self) -> &str {
		&self.user_pool_id
	}

	/// Well-known JWKS URL of the user pool.
	pub fn jwks_url(&self) -> Result<Url> {
		Ok(Url::parse(&format!(
			"https://cognito-idp.{}.amazonaws.com/{}/.well-known/jwks.json",
			self.region, self.user_pool_id
		))?)
	}
}

impl TryFrom<RawCoordinates> for IdentityCoordinates {
	type Error = Error;

	fn try_from(raw: RawCoordinates) -> Result<Self> {
		Self::new(raw.region, raw.user_pool_id)
	}
}

#[derive(Deserialize)]
struct RawCoordinates {
	region: String,
	user_pool_id: String,
}

/// Everything needed to construct the remote key source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteSourcePlan {
	/// Identity coordinates the URL was built from.
	pub coordinates: IdentityCoordinates,
	/// Cognito JWKS endpoint.
	pub jwks_url: Url,
	/// Merged fetch configuration.
	pub config: RemoteFetchConfig,
}

/// Resolve the remote source plan for the given options and environment.
///
/// Validation happens here, before anything network-capable is constructed.
pub fn resolve_remote(options: &JwkSetOptions, env: &Environment) -> Result<RemoteSourcePlan> {
	let coordinates = IdentityCoordinates::resolve(options, env)?;
	let jwks_url = coordinates.jwks_url()?;
	let config = RemoteFetchConfig::merged(&options.remote);

	Ok(RemoteSourcePlan { coordinates, jwks_url, config })
}

fn millis(duration: &Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_u64(millis(duration))
}

fn deserialize_millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Duration::from_millis(u64::deserialize(deserializer)?))
}

fn serialize_optional_millis<S>(
	duration: &Option<Duration>,
	serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match duration {
		Some(duration) => serializer.serialize_some(&millis(duration)),
		None => serializer.serialize_none(),
	}
}

fn deserialize_optional_millis<'de, D>(
	deserializer: D,
) -> std::result::Result<Option<Duration>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}
