//! Response classification and final-response selection.
//!
//! [`Outcomes`] accumulates classified attempts for one inbound request;
//! [`decide`] picks the single response the caller should see once
//! collection is over. Random picks are uniform over the eligible bucket.

use hyper::StatusCode;
use rand::seq::SliceRandom;
use rand::Rng;

use super::dispatch::AttemptResponse;

pub const NO_ENDPOINTS: &str = "no endpoints to query";
pub const UNKNOWN_ERROR: &str = "unknown error";
pub const TIMED_OUT: &str = "request timed out";

/// Completion policy for a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Any failing backend fails the whole broadcast.
    AllMustSucceed,
    /// One success is enough; the first one is forwarded immediately.
    AnySuccess,
}

impl Policy {
    #[must_use]
    pub const fn from_all_must_succeed(all_must_succeed: bool) -> Self {
        if all_must_succeed {
            Self::AllMustSucceed
        } else {
            Self::AnySuccess
        }
    }

    #[must_use]
    pub const fn forwards_early(self) -> bool {
        matches!(self, Self::AnySuccess)
    }
}

/// The single response returned to the caller.
#[derive(Debug, Clone)]
pub enum FinalResponse {
    Upstream(AttemptResponse),
    Synthesized {
        status: StatusCode,
        message: &'static str,
    },
}

impl FinalResponse {
    #[must_use]
    pub const fn no_endpoints() -> Self {
        Self::Synthesized {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: NO_ENDPOINTS,
        }
    }

    #[must_use]
    pub const fn unknown_error() -> Self {
        Self::Synthesized {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: UNKNOWN_ERROR,
        }
    }

    #[must_use]
    pub const fn timed_out() -> Self {
        Self::Synthesized {
            status: StatusCode::GATEWAY_TIMEOUT,
            message: TIMED_OUT,
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Upstream(attempt) => attempt.status,
            Self::Synthesized { status, .. } => *status,
        }
    }

    /// Originating target, if this is a genuine upstream response.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Upstream(attempt) => Some(&attempt.target),
            Self::Synthesized { .. } => None,
        }
    }
}

/// Classified attempts of one inbound request.
#[derive(Debug, Default)]
pub struct Outcomes {
    pub successful: Vec<AttemptResponse>,
    pub failed: Vec<AttemptResponse>,
}

impl Outcomes {
    /// Completed attempts so far.
    #[must_use]
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    /// File an attempt under its bucket. Returns `true` for a success.
    pub fn record(&mut self, attempt: AttemptResponse) -> bool {
        if attempt.is_success() {
            self.successful.push(attempt);
            true
        } else {
            self.failed.push(attempt);
            false
        }
    }
}

/// Pick the final response using the thread-local RNG.
#[must_use]
pub fn decide(policy: Policy, outcomes: &Outcomes) -> FinalResponse {
    decide_with(policy, outcomes, &mut rand::thread_rng())
}

/// Rules, first match wins:
///
/// 1. nothing completed: 503 "no endpoints to query"
/// 2. every completed attempt succeeded: a random success
/// 3. every completed attempt failed: a random failure
/// 4. some failed under [`Policy::AllMustSucceed`]: a random failure
/// 5. anything else: 503 "unknown error"
pub fn decide_with<R: Rng + ?Sized>(policy: Policy, outcomes: &Outcomes, rng: &mut R) -> FinalResponse {
    let total = outcomes.total();
    let succeeded = outcomes.successful.len();
    let failed = outcomes.failed.len();

    if total == 0 {
        return FinalResponse::no_endpoints();
    }
    if succeeded >= total {
        return pick(&outcomes.successful, rng);
    }
    if failed == total {
        return pick(&outcomes.failed, rng);
    }
    if failed > 0 && policy == Policy::AllMustSucceed {
        return pick(&outcomes.failed, rng);
    }
    // Mixed results under AnySuccess; the caller already got the first
    // success through early forwarding.
    FinalResponse::unknown_error()
}

fn pick<R: Rng + ?Sized>(responses: &[AttemptResponse], rng: &mut R) -> FinalResponse {
    responses
        .choose(rng)
        .cloned()
        .map_or_else(FinalResponse::unknown_error, FinalResponse::Upstream)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use axum::http::HeaderMap;
    use bytes::Bytes;

    use super::*;

    fn attempt(target: &str, status: u16) -> AttemptResponse {
        AttemptResponse {
            target: target.into(),
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from(format!("{target}:{status}")),
            latency_ms: 1,
        }
    }

    fn outcomes(attempts: &[(&str, u16)]) -> Outcomes {
        let mut outcomes = Outcomes::default();
        for (target, status) in attempts {
            outcomes.record(attempt(target, *status));
        }
        outcomes
    }

    #[test]
    fn nothing_completed_is_no_endpoints() {
        for policy in [Policy::AllMustSucceed, Policy::AnySuccess] {
            let decision = decide(policy, &Outcomes::default());
            assert_eq!(decision.status(), StatusCode::SERVICE_UNAVAILABLE);
            assert!(matches!(
                decision,
                FinalResponse::Synthesized { message: NO_ENDPOINTS, .. }
            ));
        }
    }

    #[test]
    fn all_succeeded_picks_a_success() {
        let outcomes = outcomes(&[("a:1", 200), ("b:1", 204), ("c:1", 302)]);
        for policy in [Policy::AllMustSucceed, Policy::AnySuccess] {
            let decision = decide(policy, &outcomes);
            assert!(decision.status().as_u16() < 400);
            assert!(decision.target().is_some());
        }
    }

    #[test]
    fn all_failed_picks_a_failure_regardless_of_policy() {
        let outcomes = outcomes(&[("a:1", 503), ("b:1", 500)]);
        for policy in [Policy::AllMustSucceed, Policy::AnySuccess] {
            let decision = decide(policy, &outcomes);
            let FinalResponse::Upstream(chosen) = decision else {
                panic!("expected an upstream response");
            };
            assert!(outcomes
                .failed
                .iter()
                .any(|f| f.status == chosen.status && f.body == chosen.body));
        }
    }

    #[test]
    fn mixed_under_all_must_succeed_fails() {
        let outcomes = outcomes(&[("ok:1", 200), ("bad:1", 503)]);
        let decision = decide(Policy::AllMustSucceed, &outcomes);
        assert_eq!(decision.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(decision.target(), Some("bad:1"));
    }

    #[test]
    fn mixed_under_any_success_falls_back() {
        let outcomes = outcomes(&[("ok:1", 200), ("bad:1", 503)]);
        let decision = decide(Policy::AnySuccess, &outcomes);
        assert!(matches!(
            decision,
            FinalResponse::Synthesized { message: UNKNOWN_ERROR, .. }
        ));
    }

    #[test]
    fn random_pick_covers_every_candidate() {
        let outcomes = outcomes(&[("a:1", 200), ("b:1", 200), ("c:1", 200)]);
        let mut rng = rand::thread_rng();
        let seen: HashSet<String> = (0..300)
            .filter_map(|_| {
                decide_with(Policy::AllMustSucceed, &outcomes, &mut rng)
                    .target()
                    .map(str::to_string)
            })
            .collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn policy_from_flag() {
        assert_eq!(Policy::from_all_must_succeed(true), Policy::AllMustSucceed);
        assert!(Policy::from_all_must_succeed(false).forwards_early());
        assert!(!Policy::AllMustSucceed.forwards_early());
    }
}
