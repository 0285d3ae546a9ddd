//! Background eviction of expired window records.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use super::limiter::FixedWindowLimiter;

/// Spawn a task that evicts expired windows every `interval`.
///
/// The task exits once `shutdown` receives a value or its sender is dropped.
pub fn spawn_housekeeping(
    limiter: Arc<FixedWindowLimiter>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting window housekeeping");

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = limiter.evict_expired();
                    if evicted > 0 {
                        debug!(evicted = evicted, remaining = limiter.len(), "Evicted expired windows");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Window housekeeping stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{ManualClock, Quota};

    #[tokio::test]
    async fn test_housekeeping_evicts_and_stops() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = Arc::new(FixedWindowLimiter::with_clock(
            Quota::new(5, 1_000).unwrap(),
            clock.clone(),
        ));
        limiter.check_one("client").unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = spawn_housekeeping(limiter.clone(), Duration::from_millis(10), rx);

        clock.advance(1_000);
        time::sleep(Duration::from_millis(100)).await;
        assert!(limiter.is_empty());

        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("housekeeping did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_housekeeping_keeps_active_windows() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = Arc::new(FixedWindowLimiter::with_clock(
            Quota::new(5, 60_000).unwrap(),
            clock.clone(),
        ));
        limiter.check_one("client").unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = spawn_housekeeping(limiter.clone(), Duration::from_millis(10), rx);

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(limiter.len(), 1);

        drop(tx);
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("housekeeping did not stop")
            .unwrap();
    }
}
