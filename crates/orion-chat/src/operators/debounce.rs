use std::time::Duration;

use tokio::time::Instant;

/// Trailing debounce: a value is released once no newer value arrived for
/// `delay`. Each push restarts the quiet period.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    /// Debouncer releasing after `delay` of quiet.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replace the pending value and restart the quiet period.
    pub fn push_at(&mut self, now: Instant, value: T) {
        self.pending = Some((now + self.delay, value));
    }

    /// When the pending value settles.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(at, _)| *at)
    }

    /// Release the settled value if its quiet period has elapsed.
    pub fn poll_due(&mut self, now: Instant) -> Option<T> {
        match self.pending.take() {
            Some((at, value)) if at <= now => Some(value),
            other => {
                self.pending = other;
                None
            }
        }
    }

    /// Forget the pending value.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
