//! Crate-wide error types and `Result` alias.

// self
use crate::_prelude::*;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Message surfaced when no identity coordinates can be resolved.
pub const MISSING_IDENTITY_MESSAGE: &str =
	"AWS_REGION and COGNITO_USER_POOL_ID must be provided via environment variables or options parameter";

/// Unified error type for the Cognito JWKS resolver.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Http(#[from] http::Error),
	#[error(transparent)]
	Jsonwebtoken(#[from] jsonwebtoken::errors::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("{}", MISSING_IDENTITY_MESSAGE)]
	Configuration,
	#[error("Fetching {url} is cooling down for another {remaining:?} after a failed attempt.")]
	Cooldown { url: url::Url, remaining: Duration },
	#[error("Upstream HTTP status {status} from {url}: {body:?}")]
	HttpStatus { status: http::StatusCode, url: url::Url, body: Option<String> },
	#[error("Invalid JSON Web Key Set: {0}")]
	InvalidKeySet(String),
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("Multiple keys in the set match kid {kid:?}.")]
	MultipleMatchingKeys { kid: Option<String> },
	#[error("No key in the set matches kid {kid:?}.")]
	NoMatchingKey { kid: Option<String> },
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// Whether the error reports unresolved identity coordinates.
	pub fn is_configuration(&self) -> bool {
		matches!(self, Self::Configuration)
	}
}
#[cfg(feature = "prometheus")]
impl<T> From<metrics::SetRecorderError<T>> for Error
where
	T: std::fmt::Display,
{
	fn from(value: metrics::SetRecorderError<T>) -> Self {
		Self::Metrics(value.to_string())
	}
}
