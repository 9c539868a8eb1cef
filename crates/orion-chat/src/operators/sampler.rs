/// Latest-value sampler: a tick emits the most recent value offered since
/// the previous tick, or nothing if none was.
#[derive(Debug)]
pub struct Sampler<T> {
    latest: Option<T>,
}

impl<T> Default for Sampler<T> {
    fn default() -> Self {
        Self { latest: None }
    }
}

impl<T> Sampler<T> {
    /// Sampler with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any unsampled value.
    pub fn offer(&mut self, value: T) {
        self.latest = Some(value);
    }

    /// Take the pending value, if any.
    pub fn tick(&mut self) -> Option<T> {
        self.latest.take()
    }

    /// Whether a value is waiting for the next tick.
    pub fn is_dirty(&self) -> bool {
        self.latest.is_some()
    }
}
