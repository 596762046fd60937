use std::time::Duration;

/// One-shot deadline for telling a single tap from a double tap.
///
/// Time is whatever monotonic clock the host stamps its touch events with.
#[derive(Debug, Clone, Copy, Default)]
pub struct TapTimer {
    deadline: Option<Duration>,
}

impl TapTimer {
    pub fn arm(&mut self, now: Duration, timeout: Duration) {
        self.deadline = Some(now + timeout);
    }

    /// Drop the pending deadline. Canceling twice, or after firing, is a no-op.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Armed and not yet elapsed at `now`.
    pub fn is_pending(&self, now: Duration) -> bool {
        self.deadline.is_some_and(|d| now < d)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Returns `true` exactly once, the first time it is polled at or after
    /// the deadline.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
