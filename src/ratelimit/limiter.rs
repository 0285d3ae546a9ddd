//! Core fixed window rate limiter implementation.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, trace};

use super::clock::{Clock, SystemClock};
use super::window::{Decision, Quota, WindowState};
use crate::error::{Result, WindowGuardError};

/// Fixed window rate limiter keyed by caller identity.
///
/// This struct is thread-safe and can be shared across multiple tasks.
/// Every key hashes to one shard of the registry, and that shard's lock
/// serializes all operations on the key. Different keys on different shards
/// never contend.
pub struct FixedWindowLimiter {
    /// Window records indexed by identity key
    windows: DashMap<String, WindowState>,
    /// Quota applied to newly opened windows
    quota: RwLock<Quota>,
    /// Time source
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    /// Create a new limiter driven by the system clock.
    pub fn new(limit: u64, window_size_ms: u64) -> Result<Self> {
        let quota = Quota::new(limit, window_size_ms)?;
        Ok(Self::with_clock(quota, Arc::new(SystemClock::new())))
    }

    /// Create a new limiter with an injected clock.
    pub fn with_clock(quota: Quota, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            quota: RwLock::new(quota),
            clock,
        }
    }

    /// Replace the shared quota.
    ///
    /// Windows that are already open keep the quota they opened with.
    pub fn configure(&self, limit: u64, window_size_ms: u64) -> Result<()> {
        let quota = Quota::new(limit, window_size_ms)?;
        *self.quota.write() = quota;
        info!(limit = limit, window_size_ms = window_size_ms, "Rate limiter configured");
        Ok(())
    }

    /// Get the current shared quota.
    pub fn quota(&self) -> Quota {
        *self.quota.read()
    }

    /// Check and charge a single unit for `key`.
    pub fn check_one(&self, key: &str) -> Result<Decision> {
        self.check(key, 1)
    }

    /// Check whether `key` may spend `cost` in its current window.
    ///
    /// Allowed checks charge the cost; denied checks change nothing.
    pub fn check(&self, key: &str, cost: u64) -> Result<Decision> {
        if key.is_empty() {
            return Err(WindowGuardError::InvalidKey);
        }
        if cost == 0 {
            return Err(WindowGuardError::InvalidCost(cost));
        }

        let quota = self.quota();

        let decision = match self.windows.entry(key.to_owned()) {
            Entry::Occupied(mut entry) => {
                let now = self.clock.now_ms();
                let current = *entry.get();
                let mut window = if current.is_expired(now) {
                    trace!(key = %key, window_start = current.window_start, "Window expired");
                    WindowState::open(now, quota)
                } else {
                    current
                };

                let decision = window.try_charge(now, cost);
                if decision.allowed {
                    *entry.get_mut() = window;
                }
                decision
            }
            Entry::Vacant(entry) => {
                let now = self.clock.now_ms();
                let mut window = WindowState::open(now, quota);

                let decision = window.try_charge(now, cost);
                if decision.allowed {
                    debug!(
                        key = %key,
                        limit = window.limit,
                        window_size_ms = window.window_size_ms,
                        "Opening new rate limit window"
                    );
                    entry.insert(window);
                }
                decision
            }
        };

        if decision.allowed {
            trace!(key = %key, cost = cost, remaining = decision.remaining, "Request allowed");
        } else {
            debug!(
                key = %key,
                cost = cost,
                retry_after_ms = decision.retry_after_ms,
                "Rate limit exceeded"
            );
        }

        Ok(decision)
    }

    /// Forget the window for `key`. Does nothing if there is none.
    pub fn reset(&self, key: &str) {
        if self.windows.remove(key).is_some() {
            debug!(key = %key, "Rate limit window reset");
        }
    }

    /// Get a snapshot of the window for `key`.
    ///
    /// Returns `None` if no record exists for the key.
    pub fn window(&self, key: &str) -> Option<WindowState> {
        self.windows.get(key).map(|entry| *entry.value())
    }

    /// Remove every record whose window has expired.
    ///
    /// Returns the number of records removed.
    pub fn evict_expired(&self) -> usize {
        let before = self.windows.len();
        let now = self.clock.now_ms();
        self.windows.retain(|_, window| !window.is_expired(now));
        before.saturating_sub(self.windows.len())
    }

    /// Clear all records.
    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Get the number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl std::fmt::Debug for FixedWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindowLimiter")
            .field("quota", &self.quota())
            .field("keys", &self.windows.len())
            .finish()
    }
}
