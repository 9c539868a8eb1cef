//! The ordered message timeline owned by the orchestrator.

use std::collections::HashSet;

use orion_core::{InboundEvent, MessageId};

/// What a history splice did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceOutcome {
    /// `inserted` page entries went in, `evicted` internal entries came out.
    Spliced {
        /// Page entries added.
        inserted: usize,
        /// Internal markers removed.
        evicted: usize,
    },
    /// The page had nothing new.
    Empty,
    /// The anchor is no longer in the timeline (it was cleared meanwhile).
    AnchorMissing,
}

/// Messages in display order, oldest first.
#[derive(Debug, Default, Clone)]
pub struct Timeline {
    entries: Vec<InboundEvent>,
}

impl Timeline {
    /// Empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[InboundEvent] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a batch at the end, in order.
    pub fn append(&mut self, batch: impl IntoIterator<Item = InboundEvent>) {
        self.entries.extend(batch);
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The backfill anchor: the oldest entry that came from the server log.
    pub fn oldest_non_internal(&self) -> Option<&MessageId> {
        self.entries.iter().map(|e| &e.id).find(|id| !id.is_internal())
    }

    /// Index of the entry with `id`.
    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }

    /// Replace everything before `anchor` with `page`.
    ///
    /// Only internal markers can precede the anchor, so they are evicted. Page
    /// entries whose id is already in the timeline (or repeated in the page)
    /// are skipped; internal entries in the page are kept.
    pub fn splice_history(&mut self, anchor: &MessageId, page: Vec<InboundEvent>) -> SpliceOutcome {
        let Some(pos) = self.position(anchor) else {
            return SpliceOutcome::AnchorMissing;
        };
        let mut seen: HashSet<MessageId> = self.entries[pos..]
            .iter()
            .filter(|e| !e.is_internal())
            .map(|e| e.id.clone())
            .collect();
        let page: Vec<InboundEvent> = page
            .into_iter()
            .filter(|e| e.is_internal() || seen.insert(e.id.clone()))
            .collect();
        if page.is_empty() {
            return SpliceOutcome::Empty;
        }
        let inserted = page.len();
        let evicted = self.entries.splice(0..pos, page).count();
        SpliceOutcome::Spliced { inserted, evicted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_core::EventType;

    fn msg(id: &str) -> InboundEvent {
        InboundEvent::new(id, EventType::Msg, id)
    }

    fn info() -> InboundEvent {
        InboundEvent::internal(EventType::Info, "connected")
    }

    fn ids(t: &Timeline) -> Vec<&str> {
        t.entries().iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn splice_evicts_leading_internal_entries() {
        let mut t = Timeline::new();
        t.append([info(), info(), msg("M3"), msg("M4")]);
        assert_eq!(t.oldest_non_internal(), Some(&MessageId::from("M3")));

        let outcome = t.splice_history(&MessageId::from("M3"), vec![msg("P1"), msg("P2")]);
        assert_eq!(outcome, SpliceOutcome::Spliced { inserted: 2, evicted: 2 });
        assert_eq!(ids(&t), ["P1", "P2", "M3", "M4"]);
    }

    #[test]
    fn splice_skips_ids_already_present() {
        let mut t = Timeline::new();
        t.append([msg("M3"), msg("M4")]);
        let outcome = t.splice_history(
            &MessageId::from("M3"),
            vec![msg("P1"), msg("M3"), msg("P1"), msg("P2")],
        );
        assert_eq!(outcome, SpliceOutcome::Spliced { inserted: 2, evicted: 0 });
        assert_eq!(ids(&t), ["P1", "P2", "M3", "M4"]);
    }

    #[test]
    fn splice_with_only_duplicates_is_empty() {
        let mut t = Timeline::new();
        t.append([msg("M3")]);
        assert_eq!(
            t.splice_history(&MessageId::from("M3"), vec![msg("M3")]),
            SpliceOutcome::Empty
        );
        assert_eq!(ids(&t), ["M3"]);
    }

    #[test]
    fn splice_after_clear_drops_page() {
        let mut t = Timeline::new();
        t.append([msg("M3")]);
        t.clear();
        assert_eq!(
            t.splice_history(&MessageId::from("M3"), vec![msg("P1")]),
            SpliceOutcome::AnchorMissing
        );
        assert!(t.is_empty());
    }

    #[test]
    fn no_anchor_in_internal_only_timeline() {
        let mut t = Timeline::new();
        t.append([info()]);
        assert_eq!(t.oldest_non_internal(), None);
    }
}
