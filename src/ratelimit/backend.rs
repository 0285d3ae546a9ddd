//! Rate limiter trait for abstracting over limiter implementations.

use super::limiter::FixedWindowLimiter;
use super::window::Decision;
use crate::error::Result;

/// Trait for rate limiter implementations.
///
/// The HTTP layer is generic over this trait so it can be driven by the
/// in-process `FixedWindowLimiter` or by a stand-in during tests.
pub trait RateLimiterBackend: Send + Sync {
    /// Check and charge `cost` for the given identity key.
    fn check(&self, key: &str, cost: u64) -> Result<Decision>;
}

impl RateLimiterBackend for FixedWindowLimiter {
    fn check(&self, key: &str, cost: u64) -> Result<Decision> {
        FixedWindowLimiter::check(self, key, cost)
    }
}
