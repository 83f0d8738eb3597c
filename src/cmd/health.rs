//! `service-broadcast health`: probe a running instance's readiness.
//!
//! Sends `GET /-/ready` to the admin listener and exits non-zero unless the
//! instance answers 200. Suitable as a container exec probe.

use std::time::Duration;

use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::error::BroadcastError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn execute(args: HealthArgs) -> Result<(), BroadcastError> {
    let url = format!("{}/-/ready", args.url.trim_end_matches('/'));
    let uri: hyper::Uri =
        url.parse()
            .map_err(|e: hyper::http::uri::InvalidUri| BroadcastError::UriParse {
                source: Box::new(e),
            })?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| BroadcastError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(PROBE_TIMEOUT, client.request(req))
        .await
        .map_err(|_| BroadcastError::HttpRequest {
            source: "readiness probe timed out after 10s".into(),
        })?
        .map_err(|e| BroadcastError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| BroadcastError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();
    let body = String::from_utf8_lossy(&body).trim().to_string();

    if !status.is_success() {
        return Err(BroadcastError::NotReady { status, body });
    }

    println!("\u{2713} service-broadcast is ready ({}): {body}", args.url);
    Ok(())
}
