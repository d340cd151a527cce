//! Windowed, capped, exponentially backed-off restart policy.
//!
//! Pure decision logic over a fixed-capacity ring of attempt timestamps so
//! the guarantees are testable without sleeping: never more than
//! `max_attempts` restarts within any sliding `window`, with delays that
//! double on each successive attempt inside the window (1s, 2s, 4s, …).

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Restart decision function over a bounded, time-ordered attempt ring.
#[derive(Debug)]
pub struct RestartPolicy {
    attempts: VecDeque<Instant>,
    max_attempts: usize,
    window: Duration,
}

impl RestartPolicy {
    /// Create a policy allowing `max_attempts` restarts per sliding `window`.
    #[must_use]
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: VecDeque::with_capacity(max_attempts),
            max_attempts,
            window,
        }
    }

    /// Decide whether a restart may proceed at `now`.
    ///
    /// Evicts attempts older than the window, then either refuses
    /// (`None` — the cap is reached; fatal until operator intervention) or
    /// records the attempt and returns the backoff to sleep before the
    /// stop+start sequence: `2^(n-1)` seconds where `n` is the number of
    /// attempts now inside the window.
    pub fn next_backoff(&mut self, now: Instant) -> Option<Duration> {
        while let Some(&oldest) = self.attempts.front() {
            if now.duration_since(oldest) > self.window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }

        if self.attempts.len() >= self.max_attempts {
            return None;
        }

        self.attempts.push_back(now);
        let exponent = u32::try_from(self.attempts.len().saturating_sub(1)).unwrap_or(u32::MAX);
        Some(Duration::from_secs(
            2u64.checked_pow(exponent).unwrap_or(u64::MAX),
        ))
    }

    /// Number of attempts currently inside the window (after the last
    /// decision's eviction pass).
    #[must_use]
    pub fn recorded_attempts(&self) -> usize {
        self.attempts.len()
    }
}
