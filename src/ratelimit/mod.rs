//! Rate limiting logic and state management.

mod backend;
mod clock;
mod housekeeping;
mod limiter;
mod window;

pub use backend::RateLimiterBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use housekeeping::spawn_housekeeping;
pub use limiter::FixedWindowLimiter;
pub use window::{Decision, Quota, WindowState};
