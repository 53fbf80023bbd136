//! Local-first key source selection with remote fallback.

// self
use crate::{
	_prelude::*,
	config::{Environment, JwkSetOptions, resolve_remote},
	local::load_local,
	metrics,
	provider::{DefaultKeySetProvider, KeyResolver, KeySetProvider, KeySource},
};

/// Chooses between the configured local key set and the Cognito endpoint.
///
/// Holds no state besides its inputs; every call to [`SourceSelector::select`] decides afresh.
#[derive(Clone, Debug)]
pub struct SourceSelector<P = DefaultKeySetProvider> {
	env: Environment,
	provider: P,
}
impl SourceSelector {
	/// Selector over the current process environment with the default provider.
	pub fn from_env() -> Self {
		Self::new(Environment::from_env())
	}

	/// Selector over an explicit environment with the default provider.
	pub fn new(env: Environment) -> Self {
		Self::with_provider(env, DefaultKeySetProvider::default())
	}
}
impl<P> SourceSelector<P>
where
	P: KeySetProvider,
{
	/// Selector over an explicit environment and provider.
	pub fn with_provider(env: Environment, provider: P) -> Self {
		Self { env, provider }
	}

	/// Environment snapshot consulted on every selection.
	pub fn environment(&self) -> &Environment {
		&self.env
	}

	/// Provider used to construct resolvers.
	pub fn provider(&self) -> &P {
		&self.provider
	}

	/// Build a resolver, preferring a usable local key set.
	///
	/// An unusable local payload is logged and skipped. The only error surfaced for missing
	/// configuration is [`Error::Configuration`], raised when the remote path cannot resolve its
	/// identity coordinates.
	pub fn select(&self, options: &JwkSetOptions) -> Result<KeyResolver> {
		if let Some(raw) = self.env.local_jwkset() {
			match load_local(raw, &self.provider) {
				Ok(resolver) => {
					tracing::debug!(source = KeySource::Local.as_str(), "using local jwks");

					metrics::record_source_selected(KeySource::Local);

					return Ok(resolver);
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						reason = err.reason(),
						"local jwks unusable, falling back to remote"
					);

					metrics::record_local_fallback(err.reason());
				},
			}
		}

		let plan = resolve_remote(options, &self.env)?;

		tracing::debug!(
			source = KeySource::Remote.as_str(),
			jwks_url = %plan.jwks_url,
			"using remote jwks"
		);

		let resolver = self.provider.remote(plan.jwks_url, plan.config)?;

		metrics::record_source_selected(KeySource::Remote);

		Ok(resolver)
	}
}

/// Resolve a key resolver from the process environment and `options`.
///
/// Reads `COGNITO_LOCAL_JWKSET`, `AWS_REGION`, and `COGNITO_USER_POOL_ID` at call time.
pub fn resolve(options: &JwkSetOptions) -> Result<KeyResolver> {
	SourceSelector::from_env().select(options)
}
