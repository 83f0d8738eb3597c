//! Target discovery: where the registry's snapshots come from.
//!
//! Defines the [`DiscoverySource`] trait for pluggable snapshot providers,
//! [`SnapshotSink`] which applies a delivered snapshot to the registry,
//! readiness flag and endpoint gauge, and [`watch_loop`] which polls a
//! source for changes until shutdown. Every delivery is a complete list of
//! addresses and replaces the previous one outright.

pub mod endpoints;
pub mod file_source;
pub mod static_source;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::BroadcastError;
use crate::readiness::Readiness;
use crate::registry::{TargetAddress, TargetRegistry};
use crate::telemetry;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SnapshotVersion {
    Hash(String),
}

// Used as Box<dyn DiscoverySource>.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn load(&self) -> Result<(Vec<TargetAddress>, SnapshotVersion), BroadcastError>;
    async fn has_changed(&self, current: &SnapshotVersion) -> Result<bool, BroadcastError>;
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Applies discovery deliveries. Never blocks longer than a registry `set`.
#[derive(Clone)]
pub struct SnapshotSink {
    registry: Arc<TargetRegistry>,
    readiness: Arc<Readiness>,
    service: String,
}

impl SnapshotSink {
    #[must_use]
    pub fn new(registry: Arc<TargetRegistry>, readiness: Arc<Readiness>, service: String) -> Self {
        Self {
            registry,
            readiness,
            service,
        }
    }

    pub fn apply(&self, targets: Vec<TargetAddress>) {
        tracing::info!(
            service = %self.service,
            count = targets.len(),
            targets = ?targets,
            "updating targets with new addresses"
        );
        telemetry::set_endpoint_count(&self.service, targets.len());
        self.registry.set(targets);
        self.readiness.ready();
    }
}

/// Poll `source` every `interval` and apply changed snapshots.
///
/// Load failures keep the current snapshot. Returns once `shutdown`
/// flips or its sender is dropped.
pub async fn watch_loop(
    source: Box<dyn DiscoverySource>,
    sink: SnapshotSink,
    mut version: SnapshotVersion,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!(source = source.name(), "discovery watch shutting down");
                return;
            }
        }

        match source.has_changed(&version).await {
            Ok(true) => {
                tracing::debug!(source = source.name(), "discovery change detected, reloading");
                match source.load().await {
                    Ok((targets, new_version)) => {
                        sink.apply(targets);
                        version = new_version;
                    }
                    Err(e) => {
                        tracing::error!(
                            source = source.name(),
                            error = %e,
                            "failed to reload targets, keeping current snapshot"
                        );
                    }
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(source = source.name(), error = %e, "discovery change check failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Hands out a new version on every `has_changed`.
    struct Counting {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl DiscoverySource for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn load(&self) -> Result<(Vec<TargetAddress>, SnapshotVersion), BroadcastError> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            let targets = (0..n).map(|i| format!("10.0.0.{i}:80")).collect();
            Ok((targets, SnapshotVersion::Hash(n.to_string())))
        }

        async fn has_changed(&self, _current: &SnapshotVersion) -> Result<bool, BroadcastError> {
            Ok(true)
        }
    }

    fn sink() -> (SnapshotSink, Arc<TargetRegistry>, Arc<Readiness>) {
        let registry = Arc::new(TargetRegistry::new());
        let readiness = Arc::new(Readiness::new());
        let sink = SnapshotSink::new(registry.clone(), readiness.clone(), "svc".into());
        (sink, registry, readiness)
    }

    #[test]
    fn apply_replaces_and_marks_ready() {
        let (sink, registry, readiness) = sink();
        assert!(readiness.is_ready().is_err());

        sink.apply(vec!["a:1".into(), "b:1".into()]);
        assert_eq!(registry.len(), 2);
        assert!(readiness.is_ready().is_ok());

        sink.apply(Vec::new());
        assert!(registry.is_empty());
        assert!(readiness.is_ready().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn watch_loop_applies_changes_until_shutdown() {
        let (sink, registry, _) = sink();
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let source = Box::new(Counting {
            loads: AtomicUsize::new(0),
        });

        let handle = tokio::spawn(watch_loop(
            source,
            sink,
            SnapshotVersion::Hash("0".into()),
            Duration::from_secs(1),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(registry.len(), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn sha256_is_stable() {
        assert_eq!(sha256_hex(b"abc"), sha256_hex(b"abc"));
        assert_ne!(sha256_hex(b"abc"), sha256_hex(b"abd"));
        assert_eq!(sha256_hex(b"").len(), 64);
    }
}
