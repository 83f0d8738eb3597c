//! `service-broadcast` mirrors HTTP requests to every endpoint of a service.
//!
//! Each inbound request is duplicated to all addresses currently in the
//! target registry, the responses are classified, and exactly one response
//! is returned to the caller according to the completion policy: by default
//! any failing backend fails the broadcast, otherwise the first success is
//! forwarded as soon as it arrives.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- Broadcast and discovery settings, duration parsing.
//! - [`discovery`] -- Snapshot sources (static list, watched targets file)
//!   and the watch loop feeding the registry.
//! - [`error`] -- Unified error type using `thiserror`.
//! - [`health`] -- `/metrics`, `/-/healthy` and `/-/ready` handlers.
//! - [`logging`] -- Structured tracing setup with JSON and pretty output.
//! - [`proxy`] -- The multiplexing engine: duplication, concurrent dispatch,
//!   classification, policy decision and per-request lifecycle.
//! - [`readiness`] -- Process-wide readiness flag.
//! - [`registry`] -- The wholesale-replaced list of target addresses.
//! - [`server`] -- Axum routers, shared state, outbound client, signals.
//! - [`telemetry`] -- Prometheus metrics recording.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML targets file support _(enabled by default)_ |

// Public items are only consumed by the binary and the integration tests.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod discovery;
pub mod error;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod readiness;
pub mod registry;
pub mod server;
pub mod telemetry;
