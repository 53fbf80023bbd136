//! Metrics helpers for source selection and remote fetch telemetry.
//!
//! Recording is a no-op unless the `metrics` feature is enabled.

// std
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
// crates.io
#[cfg(feature = "metrics")] use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "metrics")] use smallvec::SmallVec;
// self
use crate::{_prelude::*, provider::KeySource};

#[cfg(feature = "metrics")]
type LabelSet = SmallVec<[Label; 4]>;

const METRIC_SOURCE_SELECTED: &str = "cognito_jwkset_source_selected_total";
const METRIC_LOCAL_FALLBACK: &str = "cognito_jwkset_local_fallback_total";
const METRIC_LOOKUPS_TOTAL: &str = "cognito_jwkset_lookups_total";
const METRIC_STALE_TOTAL: &str = "cognito_jwkset_stale_total";
const METRIC_FETCH_TOTAL: &str = "cognito_jwkset_fetch_total";
const METRIC_FETCH_DURATION: &str = "cognito_jwkset_fetch_duration_seconds";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record which source backs a newly built resolver.
pub fn record_source_selected(source: KeySource) {
	#[cfg(feature = "metrics")]
	{
		let mut labels = LabelSet::new();

		labels.push(Label::new("source", source.as_str()));

		metrics::counter!(METRIC_SOURCE_SELECTED, labels.iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (METRIC_SOURCE_SELECTED, source);
}

/// Record a configured local key set that could not be used.
pub fn record_local_fallback(reason: &'static str) {
	#[cfg(feature = "metrics")]
	{
		let mut labels = LabelSet::new();

		labels.push(Label::new("reason", reason));

		metrics::counter!(METRIC_LOCAL_FALLBACK, labels.iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (METRIC_LOCAL_FALLBACK, reason);
}

/// Record a remote lookup served from the cache, tagging whether it was stale.
pub fn record_lookup_hit(jwks_url: &str, stale: bool) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(METRIC_LOOKUPS_TOTAL, outcome_labels(jwks_url, "hit").iter())
			.increment(1);

		if stale {
			metrics::counter!(METRIC_STALE_TOTAL, url_labels(jwks_url).iter()).increment(1);
		}
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (METRIC_LOOKUPS_TOTAL, METRIC_STALE_TOTAL, jwks_url, stale);
}

/// Record a remote lookup that required a fetch.
pub fn record_lookup_miss(jwks_url: &str) {
	#[cfg(feature = "metrics")]
	metrics::counter!(METRIC_LOOKUPS_TOTAL, outcome_labels(jwks_url, "miss").iter()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = jwks_url;
}

/// Record a successful fetch or revalidation along with its latency.
pub fn record_fetch_success(jwks_url: &str, duration: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(METRIC_FETCH_TOTAL, outcome_labels(jwks_url, "success").iter())
			.increment(1);
		metrics::histogram!(METRIC_FETCH_DURATION, url_labels(jwks_url).iter())
			.record(duration.as_secs_f64());
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (METRIC_FETCH_TOTAL, METRIC_FETCH_DURATION, jwks_url, duration);
}

/// Record a failed fetch.
pub fn record_fetch_error(jwks_url: &str) {
	#[cfg(feature = "metrics")]
	metrics::counter!(METRIC_FETCH_TOTAL, outcome_labels(jwks_url, "error").iter()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = jwks_url;
}

#[cfg(feature = "metrics")]
fn url_labels(jwks_url: &str) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("jwks_url", jwks_url.to_owned()));

	labels
}

#[cfg(feature = "metrics")]
fn outcome_labels(jwks_url: &str, outcome: &'static str) -> LabelSet {
	let mut labels = url_labels(jwks_url);

	labels.push(Label::new("outcome", outcome));

	labels
}
