//! Core HTTP broadcasting handler.
//!
//! [`broadcast_handler`] is the Axum fallback receiving every inbound
//! request on the broadcast listener. It buffers the request and delegates
//! to the multiplexing engine. Submodules handle duplication
//! ([`duplicate`]), concurrent dispatch ([`dispatch`]), classification and
//! the final decision ([`policy`]), the per-request lifecycle
//! ([`multiplex`]), and header hygiene ([`headers`]).

pub mod dispatch;
pub mod duplicate;
pub mod headers;
pub mod multiplex;
pub mod policy;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Uri, Version};
use axum::response::{IntoResponse, Response};

use crate::server::AppState;
use duplicate::BufferedRequest;
use headers::CORRELATION_HEADER;
use policy::FinalResponse;

pub async fn broadcast_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    version: Version,
    req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = req_headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    tracing::debug!(
        correlation_id = %correlation_id,
        method = %method,
        uri = %uri,
        "received request, mirroring to targets"
    );

    let request = BufferedRequest::new(method, uri, version, req_headers, body);
    let decision = multiplex::broadcast(state, request, correlation_id.clone()).await;

    into_response(decision, &correlation_id)
}

fn into_response(decision: FinalResponse, correlation_id: &str) -> Response {
    let mut response = match decision {
        FinalResponse::Upstream(attempt) => {
            let mut resp_headers = attempt.headers;
            headers::strip_response_hop_by_hop(&mut resp_headers);
            let mut response = Response::new(axum::body::Body::from(attempt.body));
            *response.status_mut() = attempt.status;
            *response.headers_mut() = resp_headers;
            response
        }
        FinalResponse::Synthesized { status, message } => (status, message).into_response(),
    };

    match HeaderValue::from_str(correlation_id) {
        Ok(value) => {
            response.headers_mut().insert(CORRELATION_HEADER, value);
        }
        Err(e) => {
            tracing::warn!(
                correlation_id = %correlation_id,
                error = %e,
                "correlation id is not a valid header value"
            );
        }
    }

    response
}

