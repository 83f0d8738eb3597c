//! Unified error type for the broadcaster.
//!
//! [`BroadcastError`] covers startup and discovery failures plus the
//! per-target rewrite error raised by the request duplicator. Per-attempt
//! transport failures are never represented here: they become synthesized
//! 500 responses and flow through normal classification.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BroadcastError {
    #[error("No discovery source configured.\n\n  {hint}")]
    NoDiscoverySource { hint: String },

    #[error("Targets file not found: {}", path.display())]
    TargetsFileNotFound { path: PathBuf },

    #[error("Targets parse error in {path}:\n  {source}")]
    TargetsParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unsupported targets file format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Cannot compose outbound URL for target '{target}': {reason}")]
    TargetRewrite { target: String, reason: String },

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Readiness check failed with status {status}: {body}")]
    NotReady { status: hyper::StatusCode, body: String },

    #[error("Failed to install metrics recorder: {0}")]
    MetricsInstall(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
