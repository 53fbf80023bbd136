//! Local-first JWKS resolution for AWS Cognito user pools, with a cached, cooldown-guarded remote
//! fallback.
//!
//! ```no_run
//! use cognito_jwkset::JwkSetOptions;
//!
//! # async fn verify(token: &str) -> cognito_jwkset::Result<()> {
//! let resolver = cognito_jwkset::resolve(
//! 	&JwkSetOptions::new().with_region("eu-west-1").with_user_pool_id("eu-west-1_ABC"),
//! )?;
//! let _key = resolver.key_for_token(token).await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod config;
pub mod http;
pub mod keys;
pub mod local;
pub mod metrics;
pub mod provider;
pub mod remote;
pub mod selector;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
pub use crate::{
	config::{
		Environment, IdentityCoordinates, JwkSetOptions, RemoteFetchConfig, RemoteFetchOverrides,
	},
	error::{Error, MISSING_IDENTITY_MESSAGE, Result},
	local::{LocalJwkSet, LocalPayloadError},
	provider::{DefaultKeySetProvider, KeyResolver, KeySetProvider, KeySource},
	remote::{RemoteJwkSet, RemoteState, RemoteStatus},
	selector::{SourceSelector, resolve},
};
