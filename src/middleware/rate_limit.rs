use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension,
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    cache::{CounterStore, keys::rate_limit_key},
    config::FailurePolicy,
    error::AppError,
    utils::Claims,
};

/// Outcome of one [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The call is the `current`-th in its window and within the limit.
    Allowed { current: i64 },
    /// The call is over the limit. It has still been counted.
    Limited { current: i64 },
    /// The store could not be reached; `admitted` follows the failure policy.
    StoreUnavailable { admitted: bool },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        match self {
            Decision::Allowed { .. } => true,
            Decision::Limited { .. } => false,
            Decision::StoreUnavailable { admitted } => *admitted,
        }
    }
}

/// Fixed-window request counter shared through the store.
///
/// The limiter keeps no state of its own: correctness rests on the store
/// serializing increments of a key, so any number of tasks or processes may
/// check against the same counters. The window is tumbling and anchored at
/// the first call, so up to `2 * limit` calls can pass across a boundary.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    failure_policy: FailurePolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, failure_policy: FailurePolicy) -> Self {
        Self {
            store,
            failure_policy,
        }
    }

    /// Counts one call by `identity` on `endpoint` and decides whether it may
    /// proceed under `limit` calls per `window`.
    ///
    /// Every call is counted, rejected ones included, and a rejection never
    /// rolls the counter back.
    pub async fn check(&self, identity: &str, endpoint: &str, limit: u32, window: Duration) -> Decision {
        debug_assert!(limit >= 1, "rate limit must admit at least one call");
        debug_assert!(!window.is_zero(), "rate limit window must be positive");

        let key = rate_limit_key(identity, endpoint);
        // Sub-second windows still need a live key.
        let window_secs = window.as_secs().max(1);

        let current = match self.store.increment_with_expiry(&key, window_secs).await {
            Ok(current) => current,
            Err(e) => {
                let admitted = self.failure_policy == FailurePolicy::Open;
                tracing::error!(
                    "Rate limit store unavailable for user: {} on {}, {}: {}",
                    identity,
                    endpoint,
                    if admitted { "admitting" } else { "refusing" },
                    e
                );
                return Decision::StoreUnavailable { admitted };
            }
        };

        if current == 1 {
            tracing::info!(
                "Rate limit initialized for user: {} on {}. Window: {} seconds.",
                identity,
                endpoint,
                window_secs
            );
        }

        if current > i64::from(limit) {
            tracing::warn!(
                "Rate limit exceeded for user: {} on {}. Limit: {}, Window: {} seconds, Requests: {}.",
                identity,
                endpoint,
                limit,
                window_secs,
                current
            );
            return Decision::Limited { current };
        }

        tracing::debug!(
            "Request {}/{} for user: '{}' on {} within {} seconds.",
            current,
            limit,
            identity,
            endpoint,
            window_secs
        );
        Decision::Allowed { current }
    }
}

/// Per-route limiter. The endpoint name is the matched route path without its
/// leading slash, the identity is the authenticated token subject.
pub async fn rate_limit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    matched_path: MatchedPath,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let endpoint = matched_path.as_str().trim_start_matches('/');
    let rule = state.config.rate_limit_rule(endpoint);

    match state
        .limiter
        .check(&claims.sub, endpoint, rule.limit, rule.window())
        .await
    {
        Decision::Limited { .. } => Err(AppError::RateLimitExceeded),
        Decision::StoreUnavailable { admitted: false } => Err(AppError::RateLimiterUnavailable),
        _ => Ok(next.run(req).await),
    }
}
