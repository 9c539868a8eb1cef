//! Roster + typing merge.

use std::cmp::Ordering;

use orion_core::{ClientEntry, Participant, TypingMap};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Compare nicks the way a reader expects: ignoring case and accents first
/// (`Émile` sorts with `emile`), then case-insensitively with accents, then by
/// the original text so the order is total and stable.
pub fn compare_nicks(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| lowercase(a).cmp(lowercase(b)))
        .then_with(|| a.cmp(b))
}

/// Lowercased with combining marks stripped after canonical decomposition.
fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

fn lowercase(s: &str) -> impl Iterator<Item = char> + '_ {
    s.chars().flat_map(char::to_lowercase)
}

/// Derive the participant list: `is_typing` comes from map membership and is
/// never stored on the roster record. Sorted by nick.
pub fn merge_participants(roster: &[ClientEntry], typing: &TypingMap) -> Vec<Participant> {
    let mut participants: Vec<Participant> = roster
        .iter()
        .map(|c| Participant {
            client_id: c.client_id.clone(),
            nick: c.nick.clone(),
            is_typing: typing.contains_key(&c.client_id),
        })
        .collect();
    participants.sort_by(|a, b| compare_nicks(&a.nick, &b.nick));
    participants
}
