//! Hop-by-hop header stripping for mirrored requests and forwarded responses.
//!
//! Mirrored requests keep every end-to-end header, `Host` included, so each
//! backend sees what the original caller sent. Connection management is
//! owned by the broadcaster on both legs.

use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Headers for one mirrored copy: the caller's headers minus hop-by-hop ones.
///
/// `content-length` is kept: the buffered body is sent unchanged.
#[must_use]
pub fn mirrored_request_headers(original: &HeaderMap) -> HeaderMap {
    let mut headers = original.clone();
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers
}

/// Strip hop-by-hop headers and `content-length` from an upstream response.
///
/// The body was fully collected by the dispatcher, so the origin's framing
/// headers no longer apply. Axum sets `content-length` from the actual body.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(hyper::header::CONTENT_LENGTH);
}
