//! Per-key fixed window state.

use serde::Serialize;

use crate::error::{Result, WindowGuardError};

/// The quota applied to every fresh window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quota {
    /// Maximum total cost allowed in one window
    pub limit: u64,
    /// Length of one window in milliseconds
    pub window_size_ms: u64,
}

impl Quota {
    /// Create a validated quota.
    pub fn new(limit: u64, window_size_ms: u64) -> Result<Self> {
        if limit == 0 {
            return Err(WindowGuardError::Config(
                "limit must be a positive integer".to_string(),
            ));
        }
        if window_size_ms == 0 {
            return Err(WindowGuardError::Config(
                "window_size_ms must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            limit,
            window_size_ms,
        })
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Cost still available in the current window
    pub remaining: u64,
    /// Milliseconds until the window resets; zero when allowed
    pub retry_after_ms: u64,
}

/// State of one key's current window.
///
/// Snapshots the quota in effect when the window opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowState {
    /// When the current window opened (clock milliseconds)
    pub window_start: u64,
    /// Cost charged so far in this window
    pub count: u64,
    /// Limit for this window
    pub limit: u64,
    /// Length of this window in milliseconds
    pub window_size_ms: u64,
}

impl WindowState {
    /// Open an empty window at `now`.
    pub fn open(now: u64, quota: Quota) -> Self {
        Self {
            window_start: now,
            count: 0,
            limit: quota.limit,
            window_size_ms: quota.window_size_ms,
        }
    }

    /// Whether the window no longer covers `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.window_start) >= self.window_size_ms
    }

    /// Clock reading at which this window closes.
    pub fn resets_at(&self) -> u64 {
        self.window_start.saturating_add(self.window_size_ms)
    }

    /// Try to charge `cost` against this window.
    ///
    /// The window is left untouched when the charge is denied.
    pub fn try_charge(&mut self, now: u64, cost: u64) -> Decision {
        let new_count = self.count.saturating_add(cost);

        if new_count > self.limit {
            return Decision {
                allowed: false,
                remaining: self.limit.saturating_sub(self.count),
                retry_after_ms: self.resets_at().saturating_sub(now),
            };
        }

        self.count = new_count;
        Decision {
            allowed: true,
            remaining: self.limit - self.count,
            retry_after_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota(limit: u64, window_size_ms: u64) -> Quota {
        Quota::new(limit, window_size_ms).unwrap()
    }

    #[test]
    fn test_quota_rejects_zero_values() {
        assert!(matches!(Quota::new(0, 1000), Err(WindowGuardError::Config(_))));
        assert!(matches!(Quota::new(10, 0), Err(WindowGuardError::Config(_))));
        assert!(Quota::new(1, 1).is_ok());
    }

    #[test]
    fn test_window_expiry_boundary() {
        let window = WindowState::open(1_000, quota(5, 500));

        assert!(!window.is_expired(1_000));
        assert!(!window.is_expired(1_499));
        assert!(window.is_expired(1_500));
        assert_eq!(window.resets_at(), 1_500);
    }

    #[test]
    fn test_charge_within_limit() {
        let mut window = WindowState::open(0, quota(10, 1000));

        let decision = window.try_charge(0, 4);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 6);
        assert_eq!(decision.retry_after_ms, 0);
        assert_eq!(window.count, 4);
    }

    #[test]
    fn test_denied_charge_leaves_window_untouched() {
        let mut window = WindowState::open(0, quota(10, 1000));
        window.try_charge(0, 8);

        let before = window;
        let decision = window.try_charge(250, 3);

        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.retry_after_ms, 750);
        assert_eq!(window, before);
    }

    #[test]
    fn test_charge_exactly_to_limit() {
        let mut window = WindowState::open(0, quota(3, 1000));

        let decision = window.try_charge(10, 3);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);
    }
}
