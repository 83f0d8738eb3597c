//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the target
//! registry, outbound HTTP client and broadcast settings),
//! [`build_router`] for the broadcast listener, [`build_admin_router`] for
//! the metrics/health listener, [`build_http_client`] for the outbound
//! client, and [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::BroadcastSettings;
use crate::health;
use crate::proxy;
use crate::readiness::Readiness;
use crate::registry::TargetRegistry;

pub const DEFAULT_MAX_BODY: usize = 10 * 1024 * 1024;

pub type HttpClient = Client<HttpConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub registry: Arc<TargetRegistry>,
    pub http_client: HttpClient,
    pub settings: BroadcastSettings,
}

impl AppState {
    #[must_use]
    pub fn new(registry: Arc<TargetRegistry>, settings: BroadcastSettings) -> Self {
        Self {
            registry,
            http_client: build_http_client(&settings),
            settings,
        }
    }
}

/// Plain-HTTP/1 client shared by every attempt of every request.
///
/// Dial timeout follows the request timeout and TCP keepalive probes run at
/// ten times it; a zero timeout leaves both at the connector defaults.
/// With keepalive off, idle connections are never pooled.
#[must_use]
pub fn build_http_client(settings: &BroadcastSettings) -> HttpClient {
    let mut connector = HttpConnector::new();
    if !settings.timeout.is_zero() {
        connector.set_connect_timeout(Some(settings.timeout));
        connector.set_keepalive(Some(settings.timeout.saturating_mul(10)));
    }
    connector.set_nodelay(true);

    let mut builder = Client::builder(TokioExecutor::new());
    if settings.keepalive {
        builder.pool_idle_timeout(Duration::from_secs(30));
    } else {
        builder.pool_max_idle_per_host(0);
    }
    builder.build(connector)
}

/// Router for the broadcast listener: every path and method is mirrored.
pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    let keepalive = state.settings.keepalive;
    let router = Router::new()
        .fallback(proxy::broadcast_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state);

    if keepalive {
        router
    } else {
        router.layer(SetResponseHeaderLayer::overriding(
            header::CONNECTION,
            HeaderValue::from_static("close"),
        ))
    }
}

/// Router for the admin listener: metrics exposition and health probes.
pub fn build_admin_router(readiness: Arc<Readiness>, metrics: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(health::metrics_handler))
        .route("/-/healthy", get(health::healthy_handler))
        .route("/-/ready", get(health::ready_handler))
        .with_state(health::AdminState { readiness, metrics })
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, terminating"),
        () = terminate => tracing::info!("received SIGTERM, terminating"),
    }
}
