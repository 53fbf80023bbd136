//! Key set validation and key selection by token header.

// crates.io
use jsonwebtoken::{
	Algorithm, DecodingKey, Header,
	jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse},
};
use serde_json::Value;
// self
use crate::_prelude::*;

/// Validate a JSON value as a key set and parse every key in it.
///
/// The value must be an object whose `keys` member is an array of objects carrying a `kty`. Entries
/// that do not parse as a supported JWK are skipped so foreign keys never hide usable ones.
pub fn parse_key_set(value: Value) -> Result<JwkSet> {
	let Value::Object(mut object) = value else {
		return Err(Error::InvalidKeySet("Payload must be a JSON object.".into()));
	};
	let Some(Value::Array(entries)) = object.remove("keys") else {
		return Err(Error::InvalidKeySet("Member `keys` must be an array.".into()));
	};
	let mut keys = Vec::with_capacity(entries.len());

	for (index, entry) in entries.into_iter().enumerate() {
		if !entry.is_object() {
			return Err(Error::InvalidKeySet(format!("Key at index {index} must be an object.")));
		}
		if !entry.get("kty").is_some_and(Value::is_string) {
			return Err(Error::InvalidKeySet(format!("Key at index {index} is missing `kty`.")));
		}

		match serde_json::from_value::<Jwk>(entry) {
			Ok(jwk) => keys.push(jwk),
			Err(err) => tracing::debug!(index, error = %err, "skipping unsupported jwk"),
		}
	}

	Ok(JwkSet { keys })
}

/// Select the single key matching the token header.
pub fn select_jwk<'a>(jwks: &'a JwkSet, header: &Header) -> Result<&'a Jwk> {
	let mut candidates = jwks.keys.iter().filter(|jwk| matches_header(jwk, header));

	match (candidates.next(), candidates.next()) {
		(Some(jwk), None) => Ok(jwk),
		(None, _) => Err(Error::NoMatchingKey { kid: header.kid.clone() }),
		(Some(_), Some(_)) => Err(Error::MultipleMatchingKeys { kid: header.kid.clone() }),
	}
}

/// Select the matching key and import it as a [`DecodingKey`].
pub fn decoding_key(jwks: &JwkSet, header: &Header) -> Result<DecodingKey> {
	let jwk = select_jwk(jwks, header)?;

	Ok(DecodingKey::from_jwk(jwk)?)
}

fn matches_header(jwk: &Jwk, header: &Header) -> bool {
	if let Some(kid) = &header.kid
		&& jwk.common.key_id.as_deref() != Some(kid.as_str())
	{
		return false;
	}
	if let Some(key_use) = &jwk.common.public_key_use
		&& !matches!(key_use, PublicKeyUse::Signature)
	{
		return false;
	}
	if let Some(alg) = &jwk.common.key_algorithm
		&& signing_algorithm(alg) != Some(header.alg)
	{
		return false;
	}

	key_type_supports(&jwk.algorithm, header.alg)
}

fn signing_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
	match alg {
		KeyAlgorithm::HS256 => Some(Algorithm::HS256),
		KeyAlgorithm::HS384 => Some(Algorithm::HS384),
		KeyAlgorithm::HS512 => Some(Algorithm::HS512),
		KeyAlgorithm::ES256 => Some(Algorithm::ES256),
		KeyAlgorithm::ES384 => Some(Algorithm::ES384),
		KeyAlgorithm::RS256 => Some(Algorithm::RS256),
		KeyAlgorithm::RS384 => Some(Algorithm::RS384),
		KeyAlgorithm::RS512 => Some(Algorithm::RS512),
		KeyAlgorithm::PS256 => Some(Algorithm::PS256),
		KeyAlgorithm::PS384 => Some(Algorithm::PS384),
		KeyAlgorithm::PS512 => Some(Algorithm::PS512),
		KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
		// Key-management algorithms never sign tokens.
		_ => None,
	}
}

fn key_type_supports(params: &AlgorithmParameters, alg: Algorithm) -> bool {
	match alg {
		Algorithm::RS256
		| Algorithm::RS384
		| Algorithm::RS512
		| Algorithm::PS256
		| Algorithm::PS384
		| Algorithm::PS512 => matches!(params, AlgorithmParameters::RSA(_)),
		Algorithm::ES256 => matches!(
			params,
			AlgorithmParameters::EllipticCurve(ec) if ec.curve == EllipticCurve::P256
		),
		Algorithm::ES384 => matches!(
			params,
			AlgorithmParameters::EllipticCurve(ec) if ec.curve == EllipticCurve::P384
		),
		Algorithm::EdDSA => matches!(params, AlgorithmParameters::OctetKeyPair(_)),
		Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 =>
			matches!(params, AlgorithmParameters::OctetKey(_)),
	}
}
