//! Inbound request buffering and per-target duplication.
//!
//! The inbound body is read once into [`Bytes`]; every duplicate gets its
//! own `Full` body over a refcounted view of that buffer, so concurrent
//! sends never share a reader.

use axum::http::{HeaderMap, Method, Uri, Version};
use bytes::Bytes;
use http_body_util::Full;

use super::headers::mirrored_request_headers;
use crate::error::BroadcastError;

/// An inbound request held in memory so it can be replayed to every target.
#[derive(Debug, Clone)]
pub struct BufferedRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BufferedRequest {
    #[must_use]
    pub fn new(method: Method, uri: Uri, version: Version, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            version,
            headers: mirrored_request_headers(&headers),
            body,
        }
    }

    /// Original path and query, `/` when the inbound URI carried none.
    #[must_use]
    pub fn path_and_query(&self) -> &str {
        self.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// Build an independent copy of this request addressed to `target`.
    pub fn duplicate_for(&self, target: &str) -> Result<hyper::Request<Full<Bytes>>, BroadcastError> {
        let uri = outbound_uri(target, self.path_and_query())?;

        let mut builder = hyper::Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .version(outbound_version(self.version));
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        builder
            .body(Full::new(self.body.clone()))
            .map_err(|e| BroadcastError::TargetRewrite {
                target: target.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Compose `http://{target}{path_and_query}`.
///
/// The target must be a bare authority: anything that parses with extra
/// path, credentials or a different host than written is rejected.
pub fn outbound_uri(target: &str, path_and_query: &str) -> Result<Uri, BroadcastError> {
    let rewrite_err = |reason: String| BroadcastError::TargetRewrite {
        target: target.to_string(),
        reason,
    };

    if target.is_empty() {
        return Err(rewrite_err("empty target address".into()));
    }

    let composed = format!("http://{target}{path_and_query}");
    let parsed = url::Url::parse(&composed).map_err(|e| rewrite_err(e.to_string()))?;
    if parsed.host_str().is_none() || !parsed.username().is_empty() {
        return Err(rewrite_err("target is not a host:port address".into()));
    }

    composed.parse::<Uri>().map_err(|e| rewrite_err(e.to_string()))
}

/// Backends are always spoken to over HTTP/1.x.
const fn outbound_version(inbound: Version) -> Version {
    if matches!(inbound, Version::HTTP_10) {
        Version::HTTP_10
    } else {
        Version::HTTP_11
    }
}
