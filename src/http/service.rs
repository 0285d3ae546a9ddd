//! Protected route handlers.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{error, info, instrument, warn};

use crate::error::WindowGuardError;
use crate::ratelimit::{Decision, RateLimiterBackend};

/// Header reporting the cost left in the caller's window.
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Shared state handed to every request.
pub struct AppState<R: RateLimiterBackend> {
    /// The rate limiter instance
    pub rate_limiter: Arc<R>,
    /// Body returned to allowed requests
    pub greeting: String,
    /// Whether `X-Forwarded-For` identifies the caller
    pub trust_forwarded_for: bool,
}

impl<R: RateLimiterBackend> AppState<R> {
    /// Create state with the default greeting and no proxy trust.
    pub fn new(rate_limiter: Arc<R>) -> Self {
        Self {
            rate_limiter,
            greeting: "Hello, World!".to_string(),
            trust_forwarded_for: false,
        }
    }
}

/// Resolve the identity key for a request.
///
/// Falls back to the peer address when forwarding headers are untrusted,
/// missing or malformed.
pub fn client_identity(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> IpAddr {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());

        if let Some(ip) = forwarded {
            return ip;
        }
    }
    peer.ip()
}

/// Greet the caller if their window still has quota.
#[instrument(skip_all, fields(peer = %peer))]
pub async fn protect<R: RateLimiterBackend + 'static>(
    State(state): State<Arc<AppState<R>>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let ip = client_identity(&headers, peer, state.trust_forwarded_for);
    info!(ip = %ip, "Detected client IP address");

    match state.rate_limiter.check(&ip.to_string(), 1) {
        Ok(decision) => {
            info!(
                ip = %ip,
                allowed = decision.allowed,
                remaining = decision.remaining,
                retry_after_ms = decision.retry_after_ms,
                "Rate limit decision made"
            );
            decision_response(decision, &state.greeting)
        }
        Err(err) => error_response(err),
    }
}

/// Turn a decision into the greeting or a 429.
pub fn decision_response(decision: Decision, greeting: &str) -> Response {
    let remaining = HeaderValue::from(decision.remaining);

    if decision.allowed {
        return (
            StatusCode::OK,
            [(RATELIMIT_REMAINING, remaining)],
            greeting.to_string(),
        )
            .into_response();
    }

    // Retry-After is whole seconds.
    let retry_after_secs = decision.retry_after_ms.div_ceil(1000);
    let message = format!(
        "Rate limit exceeded. Try again in {} ms.",
        decision.retry_after_ms
    );

    (
        StatusCode::TOO_MANY_REQUESTS,
        [
            (header::RETRY_AFTER, HeaderValue::from(retry_after_secs)),
            (RATELIMIT_REMAINING, remaining),
        ],
        message,
    )
        .into_response()
}

/// Map a limiter error onto an HTTP response for this request only.
pub fn error_response(err: WindowGuardError) -> Response {
    if err.is_caller_error() {
        warn!(error = %err, "Rejected malformed rate limit check");
        (StatusCode::BAD_REQUEST, err.to_string()).into_response()
    } else {
        error!(error = %err, "Rate limit check failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}
