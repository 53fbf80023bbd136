//! Local-versus-remote selection properties, observed through a recording provider.

// std
use std::sync::Mutex;
// crates.io
use cognito_jwkset::{
	DefaultKeySetProvider, Environment, JwkSetOptions, KeyResolver, KeySetProvider, KeySource,
	RemoteFetchConfig, Result, SourceSelector,
};
use serde_json::Value;
use url::Url;
// self
use crate::JWKS_BODY;

const COGNITO_LOCAL_JWKS: &str = r#"{
	"keys": [
		{ "kty": "RSA", "use": "sig", "kid": "test-key-id", "n": "test-modulus", "e": "AQAB" }
	]
}"#;

#[derive(Debug, Default)]
struct RecordingProvider {
	inner: DefaultKeySetProvider,
	calls: Mutex<Vec<KeySource>>,
}
impl RecordingProvider {
	fn calls(&self) -> Vec<KeySource> {
		self.calls.lock().expect("calls lock").clone()
	}
}
impl KeySetProvider for RecordingProvider {
	fn local(&self, payload: Value) -> Result<KeyResolver> {
		self.calls.lock().expect("calls lock").push(KeySource::Local);
		self.inner.local(payload)
	}

	fn remote(&self, jwks_url: Url, config: RemoteFetchConfig) -> Result<KeyResolver> {
		self.calls.lock().expect("calls lock").push(KeySource::Remote);
		self.inner.remote(jwks_url, config)
	}
}

fn selector(env: Environment) -> SourceSelector<RecordingProvider> {
	let _ = tracing_subscriber::fmt::try_init();

	SourceSelector::with_provider(env, RecordingProvider::default())
}

fn pool_env() -> Environment {
	Environment::default().with_region("us-east-1").with_user_pool_id("us-east-1_EXAMPLE123")
}

#[test]
fn missing_identity_without_local_keys_is_a_configuration_error() {
	let selector = selector(Environment::default());
	let err = selector.select(&JwkSetOptions::new()).expect_err("nothing configured");

	assert!(err.is_configuration());
	assert!(err.to_string().contains("AWS_REGION and COGNITO_USER_POOL_ID must be provided"));
	assert!(selector.provider().calls().is_empty(), "no constructor may run");
}

#[test]
fn valid_local_keys_are_used_without_identity() {
	let selector = selector(Environment::default().with_local_jwkset(COGNITO_LOCAL_JWKS));
	let resolver = selector.select(&JwkSetOptions::new()).expect("local resolver");

	assert_eq!(resolver.source(), KeySource::Local);
	assert_eq!(selector.provider().calls(), vec![KeySource::Local]);
}

#[test]
fn valid_local_keys_win_over_valid_identity() {
	let selector = selector(pool_env().with_local_jwkset(JWKS_BODY));
	let options = JwkSetOptions::new().with_region("eu-west-1").with_user_pool_id("eu-west-1_ABC");
	let resolver = selector.select(&options).expect("local resolver");

	assert_eq!(resolver.source(), KeySource::Local);
	assert_eq!(selector.provider().calls(), vec![KeySource::Local]);
}

#[test]
fn malformed_local_keys_fall_back_to_remote() {
	let selector = selector(pool_env().with_local_jwkset("invalid-json"));
	let resolver = selector.select(&JwkSetOptions::new()).expect("remote resolver");

	assert_eq!(resolver.source(), KeySource::Remote);
	assert_eq!(
		resolver.jwks_url().map(Url::as_str),
		Some(
			"https://cognito-idp.us-east-1.amazonaws.com/us-east-1_EXAMPLE123/.well-known/jwks.json"
		)
	);
	// Parsing failed before the local constructor was reached.
	assert_eq!(selector.provider().calls(), vec![KeySource::Remote]);
}

#[test]
fn rejected_local_keys_fall_back_to_remote() {
	let selector = selector(pool_env().with_local_jwkset(r#"{"keys": [{"kid": "no-kty"}]}"#));
	let resolver = selector.select(&JwkSetOptions::new()).expect("remote resolver");

	assert_eq!(resolver.source(), KeySource::Remote);
	assert_eq!(selector.provider().calls(), vec![KeySource::Local, KeySource::Remote]);
}

#[test]
fn foreign_keys_do_not_push_local_sets_to_remote() {
	let payload = r#"{
		"keys": [
			{ "kty": "EC", "crv": "secp256k1", "kid": "wallet", "x": "AQAB", "y": "AQAB" },
			{ "kty": "RSA", "use": "sig", "kid": "test-key-id", "n": "test-modulus", "e": "AQAB" }
		]
	}"#;
	let selector = selector(pool_env().with_local_jwkset(payload));
	let resolver = selector.select(&JwkSetOptions::new()).expect("local resolver");

	assert_eq!(resolver.source(), KeySource::Local);
	assert_eq!(selector.provider().calls(), vec![KeySource::Local]);
}

#[test]
fn unusable_local_keys_without_identity_surface_the_configuration_error() {
	let selector = selector(Environment::default().with_local_jwkset("{not json"));
	let err = selector.select(&JwkSetOptions::new()).expect_err("no usable source");

	assert!(err.is_configuration());
}

#[test]
fn explicit_options_satisfy_identity_with_empty_environment() {
	let selector = selector(Environment::default());
	let options =
		JwkSetOptions::new().with_region("us-east-1").with_user_pool_id("us-east-1_EXAMPLE123");
	let resolver = selector.select(&options).expect("remote resolver");

	assert_eq!(resolver.source(), KeySource::Remote);
	assert_eq!(selector.provider().calls(), vec![KeySource::Remote]);
}

#[test]
fn remote_url_is_built_from_identity_coordinates() {
	let selector = selector(Environment::default());
	let options = JwkSetOptions::new().with_region("eu-west-1").with_user_pool_id("eu-west-1_ABC");
	let resolver = selector.select(&options).expect("remote resolver");

	assert_eq!(
		resolver.jwks_url().map(Url::as_str),
		Some("https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_ABC/.well-known/jwks.json")
	);
}

#[test]
fn fallback_uses_the_callers_remote_options_unchanged() {
	let selector = selector(pool_env().with_local_jwkset("invalid-json"));
	let options = JwkSetOptions::new()
		.with_timeout(std::time::Duration::from_secs(3))
		.with_headers([("X-Api-Client", "billing")]);
	let resolver = selector.select(&options).expect("remote resolver");
	let remote = resolver.as_remote().expect("remote key set");

	assert_eq!(remote.config(), &RemoteFetchConfig::merged(&options.remote));
	assert_eq!(remote.config().timeout, std::time::Duration::from_secs(3));
	assert_eq!(remote.config().cooldown, RemoteFetchConfig::default().cooldown);
	assert!(!remote.config().headers.contains_key("User-Agent"));
}

#[test]
fn each_selection_is_decided_afresh() {
	let selector = selector(pool_env().with_local_jwkset(r#"{"keys": "not-an-array"}"#));

	for _ in 0..2 {
		assert_eq!(
			selector.select(&JwkSetOptions::new()).expect("remote").source(),
			KeySource::Remote
		);
	}

	assert_eq!(
		selector.provider().calls(),
		vec![KeySource::Local, KeySource::Remote, KeySource::Local, KeySource::Remote]
	);
}

#[tokio::test]
async fn local_resolver_serves_keys_by_kid() {
	let selector = selector(Environment::default().with_local_jwkset(JWKS_BODY));
	let resolver = selector.select(&JwkSetOptions::new()).expect("local resolver");

	assert!(resolver.get_key(&crate::rs256_header("primary")).await.is_ok());
	assert!(matches!(
		resolver.get_key(&crate::rs256_header("unknown")).await,
		Err(cognito_jwkset::Error::NoMatchingKey { .. })
	));
}
