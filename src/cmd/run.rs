//! `service-broadcast run`: start the broadcasting proxy.
//!
//! Loads the first target snapshot, starts the broadcast listener and the
//! admin (metrics/health) listener, and keeps the registry current through
//! the discovery watch loop. On SIGTERM / Ctrl+C the instance turns not
//! ready, stops discovery, and gives in-flight requests a bounded grace
//! period before exiting.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::cli::RunArgs;
use crate::config::{BroadcastSettings, DiscoverySettings};
use crate::discovery::file_source::FileSource;
use crate::discovery::static_source::StaticSource;
use crate::discovery::{self, DiscoverySource, SnapshotSink};
use crate::error::BroadcastError;
use crate::logging;
use crate::proxy::policy::Policy;
use crate::readiness::Readiness;
use crate::registry::TargetRegistry;
use crate::server::{self, AppState};
use crate::telemetry;

pub async fn execute(args: RunArgs) -> Result<(), BroadcastError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let metrics_handle = telemetry::install_recorder()?;

    let settings = BroadcastSettings {
        policy: Policy::from_all_must_succeed(args.all_must_succeed),
        timeout: args.timeout,
        keepalive: args.keepalive,
    };
    let discovery_settings = DiscoverySettings {
        service: args.service.clone(),
        port_name: args.port_name.clone(),
        namespace: args.namespace.clone(),
    };

    let source = resolve_discovery_source(&args, discovery_settings)?;

    let registry = Arc::new(TargetRegistry::new());
    let readiness = Arc::new(Readiness::new());
    let sink = SnapshotSink::new(registry.clone(), readiness.clone(), args.service.clone());

    let (targets, version) = source.load().await?;
    sink.apply(targets);

    let listen: SocketAddr = args.listen.parse()?;
    let metrics_listen: SocketAddr = args.metrics_listen.parse()?;
    let listener = tokio::net::TcpListener::bind(listen).await?;
    let admin_listener = tokio::net::TcpListener::bind(metrics_listen).await?;

    let state = Arc::new(AppState::new(registry, settings));
    let router = server::build_router(state, args.max_body);
    let admin_router = server::build_admin_router(readiness.clone(), metrics_handle);

    // Flipping shutdown_tx stops the watch loop and the broadcast listener.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let watch_handle = tokio::spawn(discovery::watch_loop(
        source,
        sink,
        version,
        args.poll_interval,
        shutdown_rx.clone(),
    ));

    let mut admin_handle =
        tokio::spawn(async move { axum::serve(admin_listener, admin_router).await });

    let mut server_shutdown = shutdown_rx;
    let mut server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    tracing::info!(
        addr = %listen,
        metrics_addr = %metrics_listen,
        service = %args.service,
        port_name = %args.port_name,
        all_must_succeed = args.all_must_succeed,
        timeout_ms = u64::try_from(args.timeout.as_millis()).unwrap_or(u64::MAX),
        keepalive = args.keepalive,
        git = env!("SERVICE_BROADCAST_GIT_SHORT"),
        "service-broadcast started"
    );

    let early_exit = tokio::select! {
        () = server::shutdown_signal() => None,
        joined = &mut server_handle => Some(("broadcast", joined)),
        joined = &mut admin_handle => Some(("admin", joined)),
    };

    readiness.not_ready("shutting down");
    tracing::info!("stopping discovery watch");
    let _ = shutdown_tx.send(true);
    if let Err(e) = watch_handle.await {
        tracing::error!(error = %e, "discovery watch task failed");
    }

    if let Some((listener, joined)) = early_exit {
        tracing::error!(listener, "server stopped unexpectedly");
        server_handle.abort();
        admin_handle.abort();
        joined??;
        return Ok(());
    }

    tracing::info!(
        grace_ms = u64::try_from(args.shutdown_grace.as_millis()).unwrap_or(u64::MAX),
        "stopping web server"
    );
    match tokio::time::timeout(args.shutdown_grace, &mut server_handle).await {
        Ok(joined) => {
            if let Err(e) = joined? {
                tracing::error!(error = %e, "failed to gracefully stop server");
            }
        }
        Err(_) => {
            tracing::warn!("grace period elapsed, terminating in-flight requests");
            server_handle.abort();
        }
    }
    admin_handle.abort();

    tracing::info!("service-broadcast stopped");
    Ok(())
}

fn resolve_discovery_source(
    args: &RunArgs,
    settings: DiscoverySettings,
) -> Result<Box<dyn DiscoverySource>, BroadcastError> {
    if let Some(ref path) = args.targets_file {
        tracing::info!(path = %path.display(), "watching targets file");
        return Ok(Box::new(FileSource::new(path.clone(), settings)?));
    }

    if !args.targets.is_empty() {
        return Ok(Box::new(StaticSource::new(args.targets.clone())));
    }

    Err(BroadcastError::NoDiscoverySource {
        hint: "Provide --targets-file <file> or at least one --target <host:port>.".into(),
    })
}
