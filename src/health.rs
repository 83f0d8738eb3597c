//! Admin listener handlers: `/metrics`, `/-/healthy` and `/-/ready`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::readiness::Readiness;

#[derive(Clone)]
pub struct AdminState {
    pub readiness: Arc<Readiness>,
    pub metrics: PrometheusHandle,
}

pub const READY_BODY: &str = "OK";
pub const NOT_READY_PREFIX: &str = "NOT READY: ";

pub async fn healthy_handler() -> &'static str {
    "OK"
}

pub async fn ready_handler(State(state): State<AdminState>) -> (StatusCode, String) {
    match state.readiness.is_ready() {
        Ok(()) => (StatusCode::OK, READY_BODY.to_string()),
        Err(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("{NOT_READY_PREFIX}{reason}"),
        ),
    }
}

pub async fn metrics_handler(State(state): State<AdminState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
