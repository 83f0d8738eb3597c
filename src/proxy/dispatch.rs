//! Concurrent dispatch of duplicated requests.
//!
//! Every target gets its own task in a [`JoinSet`]; the set doubles as the
//! completion stream (`join_next` yields attempts in completion order) and
//! as the cancellation scope (dropping it aborts whatever is still in
//! flight). Transport failures never escape a task: they are converted into
//! a synthesized 500 [`AttemptResponse`].

use std::time::Instant;

use axum::http::HeaderMap;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::StatusCode;
use rand::seq::SliceRandom;
use tokio::task::JoinSet;

use super::duplicate::BufferedRequest;
use crate::registry::TargetAddress;
use crate::server::HttpClient;

/// Outcome of one round trip to one target.
#[derive(Debug, Clone)]
pub struct AttemptResponse {
    pub target: TargetAddress,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub latency_ms: u64,
}

impl AttemptResponse {
    /// A failed attempt standing in for a transport-level error.
    #[must_use]
    pub fn transport_failure(target: TargetAddress, error: &str, latency_ms: u64) -> Self {
        Self {
            target,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: HeaderMap::new(),
            body: Bytes::from(error.to_string()),
            latency_ms,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.as_u16() < 400
    }
}

/// Attempts launched for one inbound request.
pub struct Dispatched {
    pub attempts: JoinSet<AttemptResponse>,
    /// Targets that were actually dispatched; skipped targets are excluded.
    pub dispatched: usize,
    pub skipped: usize,
}

/// Launch one attempt per target in a uniformly shuffled order.
///
/// Targets whose address cannot be composed into a URL are logged and
/// skipped. Must be called from within a Tokio runtime.
pub fn dispatch(
    client: &HttpClient,
    request: &BufferedRequest,
    targets: &[TargetAddress],
    correlation_id: &str,
) -> Dispatched {
    let mut order: Vec<&TargetAddress> = targets.iter().collect();
    order.shuffle(&mut rand::thread_rng());

    let mut attempts = JoinSet::new();
    let mut skipped = 0;

    for target in order {
        let outbound = match request.duplicate_for(target) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    correlation_id = %correlation_id,
                    target = %target,
                    error = %e,
                    "failed to rewrite request for target, skipping"
                );
                skipped += 1;
                continue;
            }
        };

        let client = client.clone();
        let target = target.clone();
        attempts.spawn(send_attempt(client, target, outbound));
    }

    Dispatched {
        dispatched: attempts.len(),
        attempts,
        skipped,
    }
}

#[allow(clippy::cast_possible_truncation)]
async fn send_attempt(
    client: HttpClient,
    target: TargetAddress,
    request: hyper::Request<Full<Bytes>>,
) -> AttemptResponse {
    let start = Instant::now();

    let response = match client.request(request).await {
        Ok(response) => response,
        Err(e) => {
            let latency_ms = start.elapsed().as_millis() as u64;
            return AttemptResponse::transport_failure(target, &error_chain(&e), latency_ms);
        }
    };

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match body {
        Ok(collected) => AttemptResponse {
            target,
            status,
            headers,
            body: collected.to_bytes(),
            latency_ms,
        },
        Err(e) => AttemptResponse::transport_failure(
            target,
            &format!("body read error: {}", error_chain(&e)),
            latency_ms,
        ),
    }
}

/// Render an error with its sources; the legacy client hides the
/// interesting part (e.g. "connection refused") behind a generic message.
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("client error (Connect)")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn error_chain_includes_sources() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(
            error_chain(&err),
            "client error (Connect): connection refused"
        );
    }

    #[test]
    fn classification_boundary() {
        let mut attempt = AttemptResponse::transport_failure("a:1".into(), "boom", 0);
        assert!(!attempt.is_success());
        assert_eq!(attempt.body, "boom");

        attempt.status = StatusCode::from_u16(399).unwrap();
        assert!(attempt.is_success());
        attempt.status = StatusCode::BAD_REQUEST;
        assert!(!attempt.is_success());
    }
}
