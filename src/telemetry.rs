//! Prometheus metrics via the `metrics` facade.
//!
//! Recording functions are no-ops until a recorder is installed, which
//! keeps tests free of global state. [`install_recorder`] is called once
//! from `run` and returns the handle used by `/metrics`.

use std::time::Duration;

use hyper::StatusCode;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::error::BroadcastError;

pub const REQUEST_DURATION_SECONDS: &str = "request_duration_seconds";
pub const SERVICE_ENDPOINT_COUNT: &str = "service_endpoint_count";

/// Request kind label; only plain HTTP is mirrored.
const KIND_HTTP: &str = "HTTP";

const REQUEST_DURATION_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, BroadcastError> {
    Ok(PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
        REQUEST_DURATION_BUCKETS,
    )?)
}

/// Install the global recorder. Fails if one is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BroadcastError> {
    let handle = builder()?.install_recorder()?;
    describe();
    Ok(handle)
}

/// A handle to a recorder that is not installed globally.
pub fn detached_handle() -> Result<PrometheusHandle, BroadcastError> {
    Ok(builder()?.build_recorder().handle())
}

fn describe() {
    metrics::describe_histogram!(
        REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Duration of HTTP requests."
    );
    metrics::describe_gauge!(
        SERVICE_ENDPOINT_COUNT,
        "Number of found endpoints for given service."
    );
}

pub fn record_request_duration(path: &str, status: StatusCode, elapsed: Duration) {
    metrics::histogram!(
        REQUEST_DURATION_SECONDS,
        "type" => KIND_HTTP,
        "endpoint" => path.to_string(),
        "status_code" => status.as_u16().to_string()
    )
    .record(elapsed.as_secs_f64());
}

#[allow(clippy::cast_precision_loss)]
pub fn set_endpoint_count(service: &str, count: usize) {
    metrics::gauge!(SERVICE_ENDPOINT_COUNT, "service" => service.to_string()).set(count as f64);
}
