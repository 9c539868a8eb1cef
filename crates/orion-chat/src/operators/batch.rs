/// Periodic window buffer.
///
/// Items accumulate between ticks; a tick yields them only if the window is
/// non-empty. Nothing is ever dropped except by an explicit [`clear`].
///
/// [`clear`]: BatchWindow::clear
#[derive(Debug)]
pub struct BatchWindow<T> {
    buf: Vec<T>,
}

impl<T> Default for BatchWindow<T> {
    fn default() -> Self {
        Self { buf: Vec::new() }
    }
}

impl<T> BatchWindow<T> {
    /// Empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to the open window.
    pub fn push(&mut self, item: T) {
        self.buf.push(item);
    }

    /// Close the current window.
    pub fn tick(&mut self) -> Option<Vec<T>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }

    /// Drop whatever the open window holds.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Flush on end of input.
    pub fn finish(&mut self) -> Option<Vec<T>> {
        self.tick()
    }

    /// Items in the open window.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the open window is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_windows_emit_nothing() {
        let mut w: BatchWindow<u32> = BatchWindow::new();
        assert_eq!(w.tick(), None);
        w.push(1);
        w.push(2);
        assert_eq!(w.tick(), Some(vec![1, 2]));
        assert_eq!(w.tick(), None);
    }

    #[test]
    fn clear_drops_open_window() {
        let mut w = BatchWindow::new();
        w.push("a");
        w.clear();
        assert!(w.is_empty());
        w.push("b");
        assert_eq!(w.finish(), Some(vec!["b"]));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Push(u16),
        Tick,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![3 => any::<u16>().prop_map(Op::Push), 1 => Just(Op::Tick)]
    }

    proptest! {
        // every pushed item comes out exactly once, in order, in non-empty batches
        #[test]
        fn batches_are_complete_and_ordered(ops in prop::collection::vec(op(), 0..200)) {
            let mut w = BatchWindow::new();
            let mut pushed = Vec::new();
            let mut emitted = Vec::new();
            for op in ops {
                match op {
                    Op::Push(v) => {
                        pushed.push(v);
                        w.push(v);
                    }
                    Op::Tick => {
                        if let Some(batch) = w.tick() {
                            prop_assert!(!batch.is_empty());
                            emitted.extend(batch);
                        }
                    }
                }
            }
            emitted.extend(w.finish().unwrap_or_default());
            prop_assert_eq!(emitted, pushed);
        }
    }
}
