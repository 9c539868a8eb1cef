/// Admits one unit of work at a time; triggers arriving while it is busy are
/// dropped, not queued.
#[derive(Debug)]
pub struct ExhaustGate<K> {
    in_flight: Option<K>,
}

impl<K> Default for ExhaustGate<K> {
    fn default() -> Self {
        Self { in_flight: None }
    }
}

impl<K> ExhaustGate<K> {
    /// Idle gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start work keyed by `key`. Returns `false` (and drops `key`) if busy.
    pub fn try_enter(&mut self, key: K) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.in_flight = Some(key);
        true
    }

    /// Finish the current work, returning its key.
    pub fn release(&mut self) -> Option<K> {
        self.in_flight.take()
    }

    /// Key of the work in flight.
    pub fn in_flight(&self) -> Option<&K> {
        self.in_flight.as_ref()
    }

    /// Whether work is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}
