//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate, health), and their associated argument
//! structs. Every `run` flag has an environment variable equivalent for
//! container deployments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::config::parse_duration;
use crate::server::DEFAULT_MAX_BODY;

#[derive(Parser)]
#[command(
    name = "service-broadcast",
    version,
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("SERVICE_BROADCAST_GIT_SHORT"),
        ", ",
        env!("SERVICE_BROADCAST_BUILD_PROFILE"),
        ")"
    ),
    about = "Broadcast HTTP requests to all endpoints of a service",
    long_about = "Mirrors every inbound HTTP request to all endpoints of a service.\n\
        Waits for all of them and reports back a failed response if any failed,\n\
        otherwise one of the successful ones.",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        service-broadcast run --target 10.0.0.1:8080 --target 10.0.0.2:8080\n  \
        service-broadcast run -s cache -p http -f endpoints.json\n  \
        service-broadcast health http://localhost:8081"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the broadcasting proxy
    Run(Box<RunArgs>),

    /// Resolve a targets file and print the addresses it yields
    Validate(ValidateArgs),

    /// Check readiness of a running instance
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        service-broadcast run -a 10.0.0.1:80 -a 10.0.0.2:80          Static targets\n  \
        service-broadcast run -s cache -p http -f endpoints.json     Endpoints file\n  \
        service-broadcast run -f targets.yaml --all-must-succeed false --pretty")]
pub struct RunArgs {
    /// Address to listen on for requests to broadcast
    #[arg(short = 'i', long = "listen", env = "LISTEN_ADDRESS", default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Address to expose metrics and health endpoints on
    #[arg(
        short,
        long = "metrics-listen",
        env = "METRICS_LISTEN_ADDRESS",
        default_value = "0.0.0.0:8081"
    )]
    pub metrics_listen: String,

    // -- Discovery --
    /// Name of the service to send the requests to
    #[arg(short, long, env = "SERVICE_NAME", default_value = "", help_heading = "Discovery")]
    pub service: String,

    /// Name of the service port to send the requests to
    #[arg(short, long, env = "SERVICE_PORT_NAME", default_value = "", help_heading = "Discovery")]
    pub port_name: String,

    /// Only consider endpoints from this namespace
    #[arg(short, long, env = "NAMESPACE", help_heading = "Discovery")]
    pub namespace: Option<String>,

    /// Targets file (.json, .yaml): address list or Endpoints objects
    #[arg(short = 'f', long, env = "TARGETS_FILE", help_heading = "Discovery")]
    pub targets_file: Option<PathBuf>,

    /// Static target address (host:port), repeatable
    #[arg(
        short = 'a',
        long = "target",
        env = "TARGETS",
        value_delimiter = ',',
        conflicts_with = "targets_file",
        help_heading = "Discovery"
    )]
    pub targets: Vec<String>,

    /// How often the targets file is checked for changes
    #[arg(
        long,
        env = "POLL_INTERVAL",
        default_value = "5s",
        value_parser = parse_duration,
        help_heading = "Discovery"
    )]
    pub poll_interval: Duration,

    // -- Broadcast policy --
    /// If any backend fails, the whole request fails; if disabled one
    /// successful response is enough
    #[arg(
        long,
        env = "ALL_MUST_SUCCEED",
        default_value_t = true,
        action = ArgAction::Set,
        help_heading = "Broadcast"
    )]
    pub all_must_succeed: bool,

    /// Timeout for mirrored requests (e.g. 10s, 500ms)
    #[arg(
        short = 't',
        long,
        env = "TIMEOUT",
        default_value = "10s",
        value_parser = parse_duration,
        help_heading = "Broadcast"
    )]
    pub timeout: Duration,

    /// Reuse connections to backends and callers
    #[arg(
        long,
        env = "KEEPALIVE",
        default_value_t = true,
        action = ArgAction::Set,
        help_heading = "Broadcast"
    )]
    pub keepalive: bool,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Tuning --
    /// Max request body size in bytes
    #[arg(long, env = "MAX_BODY_SIZE", default_value_t = DEFAULT_MAX_BODY, help_heading = "Tuning")]
    pub max_body: usize,

    /// Time in-flight requests get to finish on shutdown
    #[arg(
        long,
        env = "SHUTDOWN_GRACE",
        default_value = "5s",
        value_parser = parse_duration,
        help_heading = "Tuning"
    )]
    pub shutdown_grace: Duration,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Targets file to resolve
    pub targets_file: PathBuf,

    /// Service name to match Endpoints objects against
    #[arg(short, long, default_value = "")]
    pub service: String,

    /// Service port name to resolve
    #[arg(short, long, default_value = "")]
    pub port_name: String,

    /// Only consider endpoints from this namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// Metrics/health URL of the running instance
    #[arg(default_value = "http://localhost:8081")]
    pub url: String,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> RunArgs {
        let mut argv = vec!["service-broadcast", "run"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Commands::Run(args)) => *args,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn run_defaults() {
        let args = run_args(&[]);
        assert_eq!(args.listen, "0.0.0.0:8080");
        assert_eq!(args.metrics_listen, "0.0.0.0:8081");
        assert!(args.all_must_succeed);
        assert!(args.keepalive);
        assert_eq!(args.timeout, Duration::from_secs(10));
        assert_eq!(args.shutdown_grace, Duration::from_secs(5));
        assert!(args.targets.is_empty());
    }

    #[test]
    fn boolean_flags_take_values() {
        let args = run_args(&["--all-must-succeed", "false", "--keepalive", "false"]);
        assert!(!args.all_must_succeed);
        assert!(!args.keepalive);
    }

    #[test]
    fn repeatable_and_delimited_targets() {
        let args = run_args(&["-a", "a:1", "--target", "b:2,c:3"]);
        assert_eq!(args.targets, vec!["a:1", "b:2", "c:3"]);
    }

    #[test]
    fn short_t_is_the_timeout() {
        let args = run_args(&["-t", "250ms", "-a", "a:1"]);
        assert_eq!(args.timeout, Duration::from_millis(250));
        assert_eq!(args.targets, vec!["a:1"]);
    }

    #[test]
    fn unparseable_timeout_is_rejected() {
        let result = Cli::try_parse_from(["service-broadcast", "run", "--timeout", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn targets_and_file_conflict() {
        let result = Cli::try_parse_from([
            "service-broadcast",
            "run",
            "-a",
            "a:1",
            "-f",
            "targets.json",
        ]);
        assert!(result.is_err());
    }
}
