//! Runtime settings derived from the command line.
//!
//! [`BroadcastSettings`] is what the multiplexing engine consumes;
//! [`DiscoverySettings`] is what the discovery sources consume. Durations
//! are accepted in the compact `10s` / `500ms` / `1m30s` form through
//! [`parse_duration`].

use std::time::Duration;

use crate::proxy::policy::Policy;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct BroadcastSettings {
    pub policy: Policy,
    /// Deadline shared by all attempts of one inbound request.
    pub timeout: Duration,
    /// Reuse outbound and inbound connections.
    pub keepalive: bool,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            policy: Policy::AllMustSucceed,
            timeout: DEFAULT_TIMEOUT,
            keepalive: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoverySettings {
    /// Name of the service whose endpoints are broadcast to.
    pub service: String,
    /// Named port of the service.
    pub port_name: String,
    /// Only consider objects from this namespace.
    pub namespace: Option<String>,
}

/// Parse a duration such as `10s`, `250ms`, `1.5s` or `1h2m3s`.
///
/// A bare `0` is accepted; any other number needs a unit
/// (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`).
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".into());
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("invalid duration '{input}': expected a number"));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid duration '{input}': bad number"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "" => return Err(format!("invalid duration '{input}': missing unit")),
            other => return Err(format!("invalid duration '{input}': unknown unit '{other}'")),
        };
        rest = &rest[unit_len..];
        total += value * seconds_per_unit;
    }

    Duration::try_from_secs_f64(total).map_err(|e| format!("invalid duration '{input}': {e}"))
}
