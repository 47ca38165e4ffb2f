//! Bounded waiting on page conditions.
//!
//! The target site renders asynchronously and offers no load-complete
//! signal we can subscribe to, so every wait is a poll with a deadline.
//! Termination policy (stall caps, attempt limits) stays with the caller.

use std::time::{Duration, Instant};

/// Polls `condition` every `interval` until it returns true or `timeout`
/// elapses. The condition is checked once before the first sleep, so a
/// zero timeout still observes the current state.
pub fn poll_until(timeout: Duration, interval: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(interval);
    }
}
