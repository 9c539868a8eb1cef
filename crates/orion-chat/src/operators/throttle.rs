use std::time::Duration;

use tokio::time::Instant;

/// Leading + trailing throttle.
///
/// The first value of a quiet period passes immediately and opens a window.
/// Values arriving inside the window coalesce to the latest one, which is
/// released when the window closes and opens the next window.
#[derive(Debug)]
pub struct Throttle<T> {
    period: Duration,
    window_end: Option<Instant>,
    trailing: Option<T>,
}

impl<T> Throttle<T> {
    /// Throttle with windows of `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            window_end: None,
            trailing: None,
        }
    }

    /// Returns the value if it may be emitted right away.
    pub fn push_at(&mut self, now: Instant, value: T) -> Option<T> {
        match self.window_end {
            Some(end) if now < end => {
                self.trailing = Some(value);
                None
            }
            _ => {
                self.window_end = Some(now + self.period);
                self.trailing = None;
                Some(value)
            }
        }
    }

    /// When the pending trailing value becomes due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.trailing.as_ref().and(self.window_end)
    }

    /// Release the trailing value once its window has closed.
    pub fn poll_due(&mut self, now: Instant) -> Option<T> {
        let end = self.window_end?;
        if now < end {
            return None;
        }
        let value = self.trailing.take();
        self.window_end = value.as_ref().map(|_| now + self.period);
        value
    }

    /// End of input: a pending trailing value is discarded.
    pub fn finish(&mut self) {
        self.window_end = None;
        self.trailing = None;
    }
}
