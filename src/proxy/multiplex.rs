//! Per-request broadcast lifecycle.
//!
//! [`broadcast`] reads one registry snapshot, dispatches every attempt and
//! hands collection to a background task. That task races the completion
//! stream against the request deadline, forwards the first success early
//! under [`Policy::AnySuccess`], and otherwise replies with the decision
//! from [`policy::decide`]. The caller is answered exactly once through a
//! oneshot channel; collection may keep running afterwards for logging and
//! metrics until every attempt finishes or the deadline passes.

use std::sync::Arc;
use std::time::Instant;

use hyper::StatusCode;
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use super::dispatch::{dispatch, AttemptResponse};
use super::duplicate::BufferedRequest;
use super::policy::{self, FinalResponse, Outcomes, Policy};
use crate::server::AppState;
use crate::telemetry;

/// State owned by the collection task of one inbound request.
struct RequestContext {
    correlation_id: String,
    path: String,
    policy: Policy,
    start: Instant,
    reply: Option<oneshot::Sender<FinalResponse>>,
    sent_status: Option<StatusCode>,
    outcomes: Outcomes,
}

impl RequestContext {
    fn already_sent(&self) -> bool {
        self.reply.is_none()
    }

    /// Answer the caller unless that already happened.
    fn send(&mut self, response: FinalResponse) {
        let Some(reply) = self.reply.take() else {
            return;
        };
        self.sent_status = Some(response.status());
        if reply.send(response).is_err() {
            tracing::debug!(
                correlation_id = %self.correlation_id,
                "caller went away before the response was ready"
            );
        }
    }

    fn classify(&mut self, attempt: AttemptResponse) {
        let replica = self.outcomes.total() + 1;

        if attempt.is_success() {
            tracing::debug!(
                correlation_id = %self.correlation_id,
                replica,
                target = %attempt.target,
                status = attempt.status.as_u16(),
                latency_ms = attempt.latency_ms,
                "replica succeeded"
            );
            if self.policy.forwards_early() && !self.already_sent() {
                tracing::debug!(
                    correlation_id = %self.correlation_id,
                    target = %attempt.target,
                    "forwarding first successful response"
                );
                self.send(FinalResponse::Upstream(attempt.clone()));
            }
        } else {
            tracing::warn!(
                correlation_id = %self.correlation_id,
                replica,
                target = %attempt.target,
                status = attempt.status.as_u16(),
                latency_ms = attempt.latency_ms,
                error = %String::from_utf8_lossy(&attempt.body),
                "replica failed"
            );
        }

        self.outcomes.record(attempt);
    }

    fn record_duration(&self, status: StatusCode) {
        telemetry::record_request_duration(&self.path, status, self.start.elapsed());
    }
}

/// Broadcast `request` to every current target and return the single
/// response the caller should see.
pub async fn broadcast(
    state: Arc<AppState>,
    request: BufferedRequest,
    correlation_id: String,
) -> FinalResponse {
    let start = Instant::now();
    let deadline = tokio::time::Instant::now() + state.settings.timeout;

    // One snapshot per request; later registry updates never reach it.
    let targets = state.registry.get();
    let dispatched = dispatch(&state.http_client, &request, &targets, &correlation_id);

    tracing::debug!(
        correlation_id = %correlation_id,
        method = %request.method,
        uri = %request.uri,
        targets = targets.len(),
        dispatched = dispatched.dispatched,
        skipped = dispatched.skipped,
        "mirroring request to targets"
    );

    let (reply_tx, reply_rx) = oneshot::channel();
    let ctx = RequestContext {
        correlation_id: correlation_id.clone(),
        path: request.uri.path().to_string(),
        policy: state.settings.policy,
        start,
        reply: Some(reply_tx),
        sent_status: None,
        outcomes: Outcomes::default(),
    };

    tokio::spawn(collect(ctx, dispatched.attempts, deadline));

    match reply_rx.await {
        Ok(response) => response,
        Err(_) => {
            tracing::error!(
                correlation_id = %correlation_id,
                "broadcast collector stopped without a response"
            );
            FinalResponse::unknown_error()
        }
    }
}

async fn collect(
    mut ctx: RequestContext,
    mut attempts: JoinSet<AttemptResponse>,
    deadline: tokio::time::Instant,
) {
    // Nothing to wait for: answer deterministically, whatever the timeout.
    if attempts.is_empty() {
        finish(&mut ctx);
        return;
    }

    let timeout = tokio::time::sleep_until(deadline);
    tokio::pin!(timeout);

    loop {
        tokio::select! {
            biased;
            () = &mut timeout => {
                on_timeout(&mut ctx, attempts.len());
                attempts.abort_all();
                return;
            }
            joined = attempts.join_next() => match joined {
                Some(Ok(attempt)) => ctx.classify(attempt),
                Some(Err(e)) => {
                    tracing::error!(
                        correlation_id = %ctx.correlation_id,
                        error = %e,
                        "attempt task failed"
                    );
                    let failure = AttemptResponse::transport_failure(
                        "unknown".into(),
                        &format!("attempt task failed: {e}"),
                        0,
                    );
                    ctx.classify(failure);
                }
                None => break,
            },
        }
    }

    tracing::debug!(
        correlation_id = %ctx.correlation_id,
        "done processing all broadcast requests"
    );
    finish(&mut ctx);
}

fn finish(ctx: &mut RequestContext) {
    let decision = policy::decide(ctx.policy, &ctx.outcomes);
    let status = decision.status();

    tracing::info!(
        correlation_id = %ctx.correlation_id,
        path = %ctx.path,
        status = status.as_u16(),
        attempts = ctx.outcomes.total(),
        succeeded = ctx.outcomes.successful.len(),
        failed = ctx.outcomes.failed.len(),
        already_sent = ctx.already_sent(),
        target = decision.target().unwrap_or("-"),
        duration_ms = u64::try_from(ctx.start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "returned final status"
    );

    ctx.record_duration(status);
    ctx.send(decision);
}

fn on_timeout(ctx: &mut RequestContext, pending: usize) {
    tracing::error!(
        correlation_id = %ctx.correlation_id,
        path = %ctx.path,
        completed = ctx.outcomes.total(),
        pending,
        already_sent = ctx.already_sent(),
        "request timed out"
    );

    ctx.send(FinalResponse::timed_out());
    // The caller saw either the early-forwarded response or the 504.
    let status = ctx.sent_status.unwrap_or(StatusCode::GATEWAY_TIMEOUT);
    ctx.record_duration(status);
}
